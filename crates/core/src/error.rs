use thiserror::Error;

use crate::domain::StepName;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Session {0} is terminal and cannot be modified")]
    SessionTerminated(String),

    #[error("retry_count may not decrease (current {current}, proposed {proposed})")]
    RetryCountDecreased { current: u32, proposed: u32 },

    #[error("retry_count {proposed} exceeds the configured maximum of {max}")]
    RetryCountExceeded { proposed: u32, max: u32 },

    #[error("Step {step} selected unknown table: {table}")]
    UnknownTable { step: StepName, table: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
