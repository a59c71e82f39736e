use orchestrator::CollaboratorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM API error: {message}")]
    Api {
        message: String,
        status_code: Option<u16>,
    },

    #[error("LLM rate limited, retry after {retry_after:?}s")]
    RateLimited { retry_after: Option<u64> },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unparseable model output: {0}")]
    Parse(String),

    #[error("Model returned no content")]
    EmptyResponse,
}

pub type LlmResult<T> = Result<T, LlmError>;

impl From<LlmError> for CollaboratorError {
    fn from(error: LlmError) -> Self {
        match error {
            LlmError::Parse(_) | LlmError::Serialization(_) | LlmError::EmptyResponse => {
                CollaboratorError::Invocation(error.to_string())
            }
            other => CollaboratorError::Unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_errors_are_invocation_failures() {
        let error: CollaboratorError = LlmError::Parse("no JSON object".to_string()).into();
        assert!(matches!(error, CollaboratorError::Invocation(_)));
    }

    #[test]
    fn test_api_errors_are_unavailability() {
        let error: CollaboratorError = LlmError::Api {
            message: "overloaded".to_string(),
            status_code: Some(503),
        }
        .into();
        assert!(matches!(error, CollaboratorError::Unavailable(_)));
    }
}
