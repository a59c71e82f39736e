use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::state::AppState;

pub const SSE_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventsQuery {
    /// Only forward events of this session
    pub session_id: Option<String>,
}

/// `event:` is the event kind, `id:` the per-session sequence number and
/// `data:` the full JSON envelope.
pub fn envelope_to_sse_event(envelope: &events::EventEnvelope) -> Result<Event, Infallible> {
    let data = serde_json::to_string(envelope).unwrap_or_else(|_| "{}".to_string());

    Ok(Event::default()
        .id(envelope.sequence.to_string())
        .event(envelope.event.kind())
        .data(data))
}

pub fn keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(SSE_KEEP_ALIVE_INTERVAL)
        .text("keep-alive")
}

#[utoipa::path(
    get,
    path = "/api/events",
    params(EventsQuery),
    responses(
        (status = 200, description = "SSE feed of every session's events"),
    ),
    tag = "events"
)]
pub async fn events_stream(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(session_id = ?query.session_id, "Global event feed subscribed");

    let stream = state
        .event_bus
        .subscribe_stream(query.session_id)
        .map(|envelope| envelope_to_sse_event(&envelope));

    Sse::new(stream).keep_alive(keep_alive())
}
