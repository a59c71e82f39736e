//! RAII guard for session lifecycle management.

use std::sync::Arc;

use chatbi_core::SessionOutcome;
use events::Event;
use tracing::{debug, warn};

use super::SessionRegistry;
use crate::core::OrderedEventEmitter;

/// Keeps a session registered while its driver runs.
///
/// Dropped without [`SessionGuard::mark_completed`] (the driver panicked or
/// was aborted), it emits a terminal `fatal` event so the caller's stream
/// never waits on a session that no longer exists. Either way the session id
/// is released.
pub struct SessionGuard {
    session_id: String,
    emitter: Arc<OrderedEventEmitter>,
    registry: SessionRegistry,
    retry_count: u32,
    completed: bool,
}

impl SessionGuard {
    pub fn new(
        session_id: impl Into<String>,
        emitter: Arc<OrderedEventEmitter>,
        registry: SessionRegistry,
    ) -> Self {
        let session_id = session_id.into();
        debug!(session_id = %session_id, "Session guard created");
        Self {
            session_id,
            emitter,
            registry,
            retry_count: 0,
            completed: false,
        }
    }

    /// Release the session id; the driver emits its own terminal event.
    pub fn mark_completed(&mut self) {
        debug!(session_id = %self.session_id, "Session marked as completed");
        self.completed = true;
        self.registry.remove(&self.session_id);
    }

    /// Last retry count seen by the driver, reported if the guard fires
    pub fn set_retry_count(&mut self, retry_count: u32) {
        self.retry_count = retry_count;
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.completed {
            warn!(
                session_id = %self.session_id,
                "Session guard dropped without completion - emitting fatal finish"
            );
            self.emitter.try_emit(Event::SessionFinished {
                outcome: SessionOutcome::Fatal,
                error: Some("session terminated unexpectedly".to_string()),
                retry_count: self.retry_count,
            });
            self.registry.remove(&self.session_id);
        }
    }
}
