//! Event types streamed to callers

use chatbi_core::{SessionOutcome, StateDelta, StepName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope wrapping every event of a session with ordering metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub session_id: String,
    /// Strictly increasing, gapless per session, starting at 0
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub event: Event,
}

impl EventEnvelope {
    pub fn new(session_id: impl Into<String>, sequence: u64, event: Event) -> Self {
        Self {
            session_id: session_id.into(),
            sequence,
            timestamp: Utc::now(),
            event,
        }
    }
}

/// All events a session can emit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A step finished and its delta was merged into the session state
    #[serde(rename = "step.completed")]
    StepCompleted { step: StepName, delta: StateDelta },

    /// Incremental answer text, emitted while the answer step is running
    #[serde(rename = "answer.chunk")]
    AnswerChunk { content: String },

    /// Terminal event; nothing follows it
    #[serde(rename = "session.finished")]
    SessionFinished {
        outcome: SessionOutcome,
        error: Option<String>,
        retry_count: u32,
    },
}

impl Event {
    /// Wire name, also used as the SSE `event:` field
    pub fn kind(&self) -> &'static str {
        match self {
            Event::StepCompleted { .. } => "step.completed",
            Event::AnswerChunk { .. } => "answer.chunk",
            Event::SessionFinished { .. } => "session.finished",
        }
    }

    /// The step a completion event belongs to, if any
    pub fn step(&self) -> Option<StepName> {
        match self {
            Event::StepCompleted { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::SessionFinished { .. })
    }
}
