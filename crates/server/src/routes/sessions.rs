use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use db::SessionRecord;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 500;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListSessionsQuery {
    /// Most recent first; defaults to 50, capped at 500
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RunningSessionsResponse {
    pub session_ids: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/api/sessions",
    params(ListSessionsQuery),
    responses(
        (status = 200, description = "Audited sessions, most recent first", body = Vec<SessionRecord>)
    ),
    tag = "sessions"
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<SessionRecord>>, AppError> {
    let Some(repository) = &state.session_repository else {
        return Ok(Json(Vec::new()));
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let sessions = repository.find_recent(limit).await?;
    Ok(Json(sessions))
}

#[utoipa::path(
    get,
    path = "/api/sessions/running",
    responses(
        (status = 200, description = "Sessions currently in flight", body = RunningSessionsResponse)
    ),
    tag = "sessions"
)]
pub async fn list_running_sessions(State(state): State<AppState>) -> Json<RunningSessionsResponse> {
    Json(RunningSessionsResponse {
        session_ids: state.orchestrator.running_sessions(),
    })
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    params(
        ("id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session found", body = SessionRecord),
        (status = 404, description = "Session not found", body = crate::error::ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionRecord>, AppError> {
    let not_found = || AppError::NotFound(format!("Session not found: {}", id));
    let repository = state.session_repository.as_ref().ok_or_else(not_found)?;

    match repository.find_by_id(&id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(not_found()),
    }
}

#[utoipa::path(
    delete,
    path = "/api/sessions/{id}",
    params(
        ("id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 202, description = "Cancellation signalled"),
        (status = 404, description = "No running session with this id", body = crate::error::ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.orchestrator.cancel(&id) {
        tracing::info!(session_id = %id, "Cancellation requested");
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(AppError::NotFound(format!("No running session: {}", id)))
    }
}

#[utoipa::path(
    delete,
    path = "/api/sessions/{id}/record",
    params(
        ("id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 204, description = "Audit record deleted"),
        (status = 404, description = "Session not found", body = crate::error::ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn delete_session_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let repository = state
        .session_repository
        .as_ref()
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {}", id)))?;
    repository.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
