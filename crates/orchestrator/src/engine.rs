//! The orchestrator: drives one session's steps in routed order.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chatbi_core::{SessionOutcome, SessionState, StateDelta, StepName, TableSchema};
use db::{SessionRecord, SessionRepository};
use events::{Event, EventBus, EventEnvelope, EventStream};
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::collaborators::CollaboratorRegistry;
use crate::config::{OrchestratorConfig, SessionConfig};
use crate::core::{OrderedEventEmitter, StepContext, StepResult};
use crate::error::{OrchestratorError, Result};
use crate::resources::{SessionGuard, SessionRegistry};
use crate::retry::RetryController;
use crate::router::Router;
use crate::steps::StepRegistry;

/// Runs sessions concurrently, one spawned driver per session.
///
/// Cheap to clone; all clones share the collaborator handles, the catalog
/// and the registry of running sessions.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<OrchestratorConfig>,
    router: Router,
    retry: RetryController,
    collaborators: Arc<CollaboratorRegistry>,
    steps: Arc<StepRegistry>,
    catalog: Arc<Vec<TableSchema>>,
    sessions: SessionRegistry,
    event_bus: Option<EventBus>,
    session_repo: Option<Arc<SessionRepository>>,
}

/// Why the drive loop stopped
enum Termination {
    Routed,
    Cancelled,
    Fatal(OrchestratorError),
}

impl Orchestrator {
    /// Fails if an enabled optional step has no collaborator behind it.
    pub fn new(config: OrchestratorConfig, collaborators: CollaboratorRegistry) -> Result<Self> {
        if config.enable_ambiguity_check && collaborators.ambiguity.is_none() {
            return Err(OrchestratorError::MissingCollaborator("ambiguity"));
        }
        if config.enable_reasoning && collaborators.reasoner.is_none() {
            return Err(OrchestratorError::MissingCollaborator("reasoner"));
        }

        Ok(Self {
            router: Router::from_config(&config),
            retry: RetryController::new(config.max_retries),
            config: Arc::new(config),
            collaborators: Arc::new(collaborators),
            steps: Arc::new(StepRegistry::standard()),
            catalog: Arc::new(Vec::new()),
            sessions: SessionRegistry::new(),
            event_bus: None,
            session_repo: None,
        })
    }

    /// Default table-schema catalog for sessions that bring none
    pub fn with_catalog(mut self, catalog: Arc<Vec<TableSchema>>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_steps(mut self, steps: StepRegistry) -> Self {
        self.steps = Arc::new(steps);
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn with_session_repo(mut self, repo: Arc<SessionRepository>) -> Self {
        self.session_repo = Some(repo);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &[TableSchema] {
        &self.catalog
    }

    /// Start a session. Validation and id conflicts are reported here,
    /// before anything runs; everything after is delivered on the stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run(&self, question: impl Into<String>, session: SessionConfig) -> Result<SessionRun> {
        let session_id = match session.session_id {
            Some(id) if id.trim().is_empty() => {
                return Err(OrchestratorError::Validation(
                    "session_id must not be blank".to_string(),
                ))
            }
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };

        let state = SessionState::new(question)?
            .with_session_id(session_id.clone())
            .with_language(
                session
                    .language
                    .unwrap_or_else(|| self.config.default_language.clone()),
            )
            .with_table_schemas(session.table_schemas.unwrap_or_else(|| self.catalog.clone()))
            .with_max_retries(self.config.max_retries);

        let token = self.sessions.register(&session_id)?;

        let (sender, events) = events::channel(self.config.event_capacity);
        let emitter = Arc::new(
            OrderedEventEmitter::new(session_id.clone(), sender).with_bus(self.event_bus.clone()),
        );
        let guard = SessionGuard::new(session_id.clone(), emitter.clone(), self.sessions.clone());

        info!(
            session_id = %session_id,
            question_len = state.question().len(),
            language = %state.language(),
            tables = state.table_schemas().len(),
            "Session started"
        );

        let this = self.clone();
        let handle = tokio::spawn(async move { this.drive(state, emitter, token, guard).await });

        Ok(SessionRun {
            session_id,
            events,
            handle: SessionHandle { handle },
        })
    }

    /// Request cancellation; it takes effect at the next step boundary.
    /// Returns `false` if no such session is running.
    pub fn cancel(&self, session_id: &str) -> bool {
        let signalled = self.sessions.cancel(session_id);
        if signalled {
            info!(session_id = %session_id, "Cancellation requested");
        } else {
            debug!(session_id = %session_id, "Cancel for unknown session ignored");
        }
        signalled
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        self.sessions.contains(session_id)
    }

    pub fn running_sessions(&self) -> Vec<String> {
        self.sessions.active_ids()
    }

    async fn drive(
        self,
        mut state: SessionState,
        emitter: Arc<OrderedEventEmitter>,
        token: CancellationToken,
        mut guard: SessionGuard,
    ) -> Result<SessionState> {
        let session_id = emitter.session_id().to_string();
        let budget = self.config.step_budget();
        let mut current = self.router.first();
        let mut executed = 0usize;

        let termination = loop {
            if current.is_terminal() || state.should_stop() {
                break Termination::Routed;
            }
            if token.is_cancelled() {
                info!(
                    session_id = %session_id,
                    next_step = %current,
                    "Cancellation observed at step boundary"
                );
                break Termination::Cancelled;
            }
            if executed >= budget {
                break Termination::Fatal(OrchestratorError::fatal(
                    current,
                    format!("step budget of {} exhausted", budget),
                ));
            }
            executed += 1;

            let mut result = match self.run_step(current, &state, &emitter).await {
                Ok(result) => result,
                Err(e) => break Termination::Fatal(e),
            };

            if let Some(failure) = &result.failure {
                warn!(
                    session_id = %session_id,
                    step = %current,
                    error = %failure,
                    "Step failed, recorded into state"
                );
            }
            if let Some(retry_count) = self.retry.observe(current, &state, &mut result) {
                info!(
                    session_id = %session_id,
                    step = %current,
                    retry_count,
                    max_retries = self.retry.max_retries(),
                    "Query failure counted"
                );
            }

            let delta = result.delta;
            if let Err(e) = state.apply(delta.clone()) {
                break Termination::Fatal(OrchestratorError::fatal(current, e.to_string()));
            }
            guard.set_retry_count(state.retry_count());
            emitter
                .emit(Event::StepCompleted {
                    step: current,
                    delta,
                })
                .await;

            let next = self.router.next(current, &state);
            if next == StepName::Query && current.is_query_path() {
                info!(
                    session_id = %session_id,
                    attempt = state.retry_count() + 1,
                    "Retrying query generation with correction context"
                );
            }
            if self.router.is_retry_exhausted(current, &state) {
                warn!(
                    session_id = %session_id,
                    retry_count = state.retry_count(),
                    "Retry budget exhausted"
                );
                if let Err(e) = state.apply(self.retry.exhaustion_delta(&state)) {
                    break Termination::Fatal(OrchestratorError::fatal(current, e.to_string()));
                }
            }
            current = next;
        };

        let (outcome, failure) = match termination {
            Termination::Routed => (state.implied_outcome(), None),
            Termination::Cancelled => (SessionOutcome::Cancelled, None),
            Termination::Fatal(e) => {
                error!(session_id = %session_id, error = %e, "Session aborted");
                let abort = StateDelta::new().with_error(e.to_string()).clear_answer();
                if let Err(apply_err) = state.apply(abort) {
                    error!(session_id = %session_id, error = %apply_err, "Could not record fatal error");
                }
                (SessionOutcome::Fatal, Some(e))
            }
        };

        if let Err(e) = state.finish(outcome) {
            error!(session_id = %session_id, error = %e, "Could not finalize session state");
        }
        guard.mark_completed();

        emitter
            .emit(Event::SessionFinished {
                outcome,
                error: state.error().map(str::to_string),
                retry_count: state.retry_count(),
            })
            .await;

        self.record(&state).await;

        info!(
            session_id = %session_id,
            outcome = outcome.as_str(),
            retry_count = state.retry_count(),
            steps = executed,
            events = emitter.current_sequence(),
            "Session finished"
        );

        match failure {
            Some(e) => Err(e),
            None => Ok(state),
        }
    }

    async fn run_step(
        &self,
        name: StepName,
        state: &SessionState,
        emitter: &OrderedEventEmitter,
    ) -> Result<StepResult> {
        let step = self
            .steps
            .get(name)
            .ok_or_else(|| OrchestratorError::fatal(name, "no step registered"))?;
        let ctx = StepContext::new(
            name,
            &self.collaborators,
            self.config.timeout_for(name),
            emitter,
        );

        debug!(step = %name, "Step started");
        let started = Instant::now();
        let outcome = AssertUnwindSafe(step.execute(state, &ctx))
            .catch_unwind()
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(result)) => {
                debug!(step = %name, elapsed_ms, failed = result.is_failure(), "Step finished");
                Ok(result)
            }
            Ok(Err(e @ OrchestratorError::Fatal { .. })) => Err(e),
            Ok(Err(e)) => Err(OrchestratorError::fatal(name, e.to_string())),
            Err(panic) => Err(OrchestratorError::fatal(
                name,
                format!("step panicked: {}", panic_message(panic.as_ref())),
            )),
        }
    }

    async fn record(&self, state: &SessionState) {
        let Some(repo) = &self.session_repo else {
            return;
        };
        let Some(record) = SessionRecord::from_state(state) else {
            return;
        };
        if let Err(e) = repo.record(&record).await {
            warn!(session_id = %record.session_id, error = %e, "Failed to record session");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A started session: its event stream plus a handle to the final state
pub struct SessionRun {
    session_id: String,
    events: EventStream,
    handle: SessionHandle,
}

impl SessionRun {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn events(&mut self) -> &mut EventStream {
        &mut self.events
    }

    pub fn into_parts(self) -> (EventStream, SessionHandle) {
        (self.events, self.handle)
    }

    /// Detach from the stream and wait for the terminal state
    pub async fn wait(self) -> Result<SessionState> {
        drop(self.events);
        self.handle.wait().await
    }

    /// Drain every event, then return them with the terminal state
    pub async fn collect(self) -> (Vec<EventEnvelope>, Result<SessionState>) {
        let envelopes = self.events.collect_all().await;
        (envelopes, self.handle.wait().await)
    }
}

/// Resolves to the terminal state, or the fatal error that aborted it
pub struct SessionHandle {
    handle: JoinHandle<Result<SessionState>>,
}

impl SessionHandle {
    pub async fn wait(self) -> Result<SessionState> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(OrchestratorError::Aborted(e.to_string())),
        }
    }
}
