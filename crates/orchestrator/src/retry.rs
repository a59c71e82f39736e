use chatbi_core::{SessionState, StateDelta, StepName};

use crate::core::StepResult;
use crate::error::OrchestratorError;

/// Correction context handed to the query generator on a routed retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    /// The query that failed; absent if generation itself failed first time
    pub prior_query: Option<String>,
    pub prior_error: String,
    /// Overall attempt number of the query step, the initial attempt being 1
    pub attempt: u32,
}

impl Correction {
    /// `None` on the initial attempt
    pub fn from_state(state: &SessionState) -> Option<Self> {
        let prior_error = state.query_error()?;
        Some(Self {
            prior_query: state.generated_query().map(str::to_string),
            prior_error: prior_error.to_string(),
            attempt: state.retry_count() + 1,
        })
    }
}

/// Bounds the query generation/execution correction loop.
///
/// Every failure on the query path counts once; the count never exceeds
/// `max_retries` and never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryController {
    max_retries: u32,
}

impl RetryController {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Fold a query-path failure into the step's delta.
    /// Returns the new retry count when one was recorded.
    pub fn observe(
        &self,
        step: StepName,
        state: &SessionState,
        result: &mut StepResult,
    ) -> Option<u32> {
        if !step.is_query_path() || !result.is_failure() {
            return None;
        }
        let next = (state.retry_count() + 1).min(self.max_retries);
        result.delta.retry_count = Some(next);
        Some(next)
    }

    pub fn is_exhausted(&self, state: &SessionState) -> bool {
        state.retry_count() >= self.max_retries
    }

    /// Terminal delta once no retry is left: error set, answer cleared
    pub fn exhaustion_delta(&self, state: &SessionState) -> StateDelta {
        let last_error = state.query_error().unwrap_or("unknown failure");
        StateDelta::new()
            .with_error(OrchestratorError::RetryExhausted.to_string())
            .clear_answer()
            .with_message(
                StepName::Query,
                format!(
                    "Giving up after {} failed attempts, last error: {}",
                    state.retry_count(),
                    last_error
                ),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;

    fn failure(step: StepName) -> StepResult {
        StepResult::failure(
            step,
            StepError::QueryExecution {
                message: "unknown column `qty`".to_string(),
            },
        )
    }

    fn state(retry_count: u32, query_error: Option<&str>) -> SessionState {
        let mut state = SessionState::new("top 5 products").unwrap();
        let mut delta = StateDelta::new().with_retry_count(retry_count);
        if let Some(error) = query_error {
            delta = delta.with_query_error(error);
        }
        state.apply(delta).unwrap();
        state
    }

    #[test]
    fn test_observe_counts_query_path_failures() {
        let controller = RetryController::new(3);
        let mut result = failure(StepName::Execute);

        assert_eq!(controller.observe(StepName::Execute, &state(1, None), &mut result), Some(2));
        assert_eq!(result.delta.retry_count, Some(2));
    }

    #[test]
    fn test_observe_ignores_success_and_other_steps() {
        let controller = RetryController::new(3);

        let mut ok = StepResult::success(StateDelta::new());
        assert_eq!(controller.observe(StepName::Execute, &state(0, None), &mut ok), None);

        let mut chart = failure(StepName::Chart);
        assert_eq!(controller.observe(StepName::Chart, &state(0, None), &mut chart), None);
        assert_eq!(chart.delta.retry_count, None);
    }

    #[test]
    fn test_observe_never_exceeds_max() {
        let controller = RetryController::new(3);
        let mut result = failure(StepName::Query);
        assert_eq!(controller.observe(StepName::Query, &state(3, None), &mut result), Some(3));
    }

    #[test]
    fn test_exhaustion_delta() {
        let controller = RetryController::new(3);
        let exhausted = state(3, Some("unknown column `qty`"));
        assert!(controller.is_exhausted(&exhausted));

        let delta = controller.exhaustion_delta(&exhausted);
        assert_eq!(delta.error.as_set().map(String::as_str), Some("retry exhausted"));
        assert!(!delta.answer.is_keep());
        assert!(delta.messages[0].content.contains("qty"));
    }

    #[test]
    fn test_correction_from_state() {
        assert!(Correction::from_state(&state(0, None)).is_none());

        let mut failed = state(1, Some("no such column: qty"));
        failed
            .apply(StateDelta::new().with_generated_query("SELECT qty FROM sales"))
            .unwrap();
        let correction = Correction::from_state(&failed).unwrap();
        assert_eq!(correction.prior_query.as_deref(), Some("SELECT qty FROM sales"));
        assert_eq!(correction.attempt, 2);
    }
}
