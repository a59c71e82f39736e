use std::sync::Arc;

use db::SessionRepository;
use events::EventBus;
use orchestrator::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub event_bus: EventBus,
    pub session_repository: Option<Arc<SessionRepository>>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, event_bus: EventBus) -> Self {
        Self {
            orchestrator,
            event_bus,
            session_repository: None,
        }
    }

    pub fn with_session_repository(mut self, repository: Arc<SessionRepository>) -> Self {
        self.session_repository = Some(repository);
        self
    }
}
