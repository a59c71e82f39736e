//! Step trait and related types.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chatbi_core::{SessionState, StateDelta, StepName};
use events::Event;

use crate::collaborators::{CollaboratorRegistry, CollaboratorResult};
use crate::error::{Result, StepError};

use super::events::OrderedEventEmitter;

/// Outcome of one step invocation.
///
/// A failure is never raised: it is recorded into the delta (`query_error`
/// for the query path, `error` otherwise) and reported alongside it so the
/// retry controller can see it.
#[derive(Debug, Default)]
pub struct StepResult {
    pub delta: StateDelta,
    pub failure: Option<StepError>,
}

impl StepResult {
    pub fn success(delta: StateDelta) -> Self {
        Self {
            delta,
            failure: None,
        }
    }

    pub fn failure(step: StepName, error: StepError) -> Self {
        let message = error.to_string();
        let delta = if step.is_query_path() {
            StateDelta::new().with_query_error(message.clone())
        } else {
            StateDelta::new().with_error(message.clone())
        };
        Self {
            delta: delta.with_message(step, format!("Failed: {}", message)),
            failure: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Read-only handles a step gets for one invocation
pub struct StepContext<'a> {
    step: StepName,
    collaborators: &'a CollaboratorRegistry,
    timeout: Duration,
    emitter: &'a OrderedEventEmitter,
}

impl<'a> StepContext<'a> {
    pub fn new(
        step: StepName,
        collaborators: &'a CollaboratorRegistry,
        timeout: Duration,
        emitter: &'a OrderedEventEmitter,
    ) -> Self {
        Self {
            step,
            collaborators,
            timeout,
            emitter,
        }
    }

    pub fn step(&self) -> StepName {
        self.step
    }

    pub fn collaborators(&self) -> &'a CollaboratorRegistry {
        self.collaborators
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Await a collaborator call under this step's timeout
    pub async fn invoke<T, F>(&self, call: F) -> std::result::Result<T, StepError>
    where
        F: Future<Output = CollaboratorResult<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(StepError::from_collaborator(self.step, error)),
            Err(_) => Err(StepError::AgentTimeout {
                step: self.step,
                timeout: self.timeout,
            }),
        }
    }

    /// Forward a partial answer to the caller's stream
    pub async fn emit_chunk(&self, content: impl Into<String>) {
        self.emitter
            .emit(Event::AnswerChunk {
                content: content.into(),
            })
            .await;
    }
}

/// A named unit of pipeline work.
///
/// `execute` reads the state and returns a delta; it never mutates the state.
/// Collaborator failures come back as `Ok` with [`StepResult::failure`];
/// `Err` means the step's own logic broke and aborts the session.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> StepName;

    async fn execute(&self, state: &SessionState, ctx: &StepContext<'_>) -> Result<StepResult>;
}
