use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::stream::{Stream, StreamExt};
use orchestrator::SessionConfig;
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::sse::{envelope_to_sse_event, keep_alive};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct QueryRequest {
    pub question: String,
    /// Generated when omitted
    #[serde(default)]
    pub session_id: Option<String>,
    /// `zh-CN` or `en-US`; the server default applies when omitted
    #[serde(default)]
    pub language: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "SSE stream of the session's events, ending with session.finished"),
        (status = 400, description = "Invalid question or session id", body = crate::error::ErrorResponse),
        (status = 409, description = "Session id already running", body = crate::error::ErrorResponse),
    ),
    tag = "query"
)]
pub async fn run_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let mut session = SessionConfig::new();
    if let Some(session_id) = request.session_id {
        session = session.with_session_id(session_id);
    }
    if let Some(language) = request.language {
        session = session.with_language(language);
    }

    let run = state.orchestrator.run(request.question, session)?;
    info!(session_id = %run.session_id(), "Query session started");

    let (events, handle) = run.into_parts();

    // The session outlives a disconnected client; its outcome is still logged
    // and audited by the orchestrator.
    tokio::spawn(async move {
        if let Err(e) = handle.wait().await {
            warn!(error = %e, "Query session aborted");
        }
    });

    let stream = events.map(|envelope| envelope_to_sse_event(&envelope));
    Ok(Sse::new(stream).keep_alive(keep_alive()))
}
