pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ChatBI API",
        version = "0.1.0",
        description = "Natural-language questions over business data, answered as a stream of pipeline events"
    ),
    paths(
        routes::health_check,
        routes::run_query,
        routes::list_sessions,
        routes::list_running_sessions,
        routes::get_session,
        routes::cancel_session,
        routes::delete_session_record,
        routes::sse::events_stream,
    ),
    components(schemas(
        routes::HealthResponse,
        routes::QueryRequest,
        routes::RunningSessionsResponse,
        error::ErrorResponse,
        db::SessionRecord,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "query", description = "Run a question through the pipeline"),
        (name = "sessions", description = "Cancellation and session audit log"),
        (name = "events", description = "Real-time event streaming (SSE)"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .route("/health", get(routes::health_check))
        .route("/api/query", post(routes::run_query))
        .route("/api/sessions", get(routes::list_sessions))
        .route("/api/sessions/running", get(routes::list_running_sessions))
        .route(
            "/api/sessions/{id}",
            get(routes::get_session).delete(routes::cancel_session),
        )
        .route(
            "/api/sessions/{id}/record",
            delete(routes::delete_session_record),
        )
        .route("/api/events", get(routes::sse::events_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
