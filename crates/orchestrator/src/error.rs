use std::time::Duration;

use chatbi_core::{CoreError, StepName};
use thiserror::Error;

/// Failure reported by an external collaborator
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollaboratorError {
    /// Output could not be parsed or was otherwise unusable
    #[error("invalid collaborator output: {0}")]
    Invocation(String),

    /// The data backend rejected or failed the query
    #[error("{0}")]
    Execution(String),

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Recoverable step failure. Its `Display` text is what lands in
/// `query_error` or `error`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StepError {
    #[error("{step} step timed out after {timeout:?}")]
    AgentTimeout { step: StepName, timeout: Duration },

    #[error("{step} step failed: {message}")]
    AgentInvocation { step: StepName, message: String },

    #[error("{message}")]
    QueryExecution { message: String },
}

impl StepError {
    pub fn from_collaborator(step: StepName, error: CollaboratorError) -> Self {
        match (step, error) {
            (StepName::Execute, CollaboratorError::Execution(message)) => {
                Self::QueryExecution { message }
            }
            (step, other) => Self::AgentInvocation {
                step,
                message: other.to_string(),
            },
        }
    }

    pub fn invalid_output(step: StepName, message: impl Into<String>) -> Self {
        Self::AgentInvocation {
            step,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("retry exhausted")]
    RetryExhausted,

    #[error("Fatal error in {step} step: {reason}")]
    Fatal { step: StepName, reason: String },

    #[error("Session task aborted: {0}")]
    Aborted(String),

    #[error("Session already running: {0}")]
    SessionExists(String),

    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error(transparent)]
    Core(CoreError),
}

impl OrchestratorError {
    pub fn fatal(step: StepName, reason: impl Into<String>) -> Self {
        Self::Fatal {
            step,
            reason: reason.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. } | Self::Aborted(_))
    }
}

impl From<CoreError> for OrchestratorError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::Validation(message) => Self::Validation(message),
            other => Self::Core(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
