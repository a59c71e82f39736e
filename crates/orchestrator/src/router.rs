use chatbi_core::{Intent, SessionState, StepName};

use crate::config::OrchestratorConfig;

/// Selects the next step from the step that just ran and the merged state.
///
/// Pure and deterministic: no I/O, no clock, no randomness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Router {
    max_retries: u32,
    ambiguity_check: bool,
    reasoning: bool,
}

impl Router {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ambiguity_check: false,
            reasoning: false,
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(config.max_retries)
            .with_ambiguity_check(config.enable_ambiguity_check)
            .with_reasoning(config.enable_reasoning)
    }

    pub fn with_ambiguity_check(mut self, enabled: bool) -> Self {
        self.ambiguity_check = enabled;
        self
    }

    pub fn with_reasoning(mut self, enabled: bool) -> Self {
        self.reasoning = enabled;
        self
    }

    pub fn first(&self) -> StepName {
        StepName::Intent
    }

    pub fn next(&self, from: StepName, state: &SessionState) -> StepName {
        if state.should_stop() || state.error().is_some() {
            return StepName::End;
        }

        match from {
            StepName::Intent => match state.intent() {
                Some(Intent::Query) if self.ambiguity_check => StepName::Ambiguity,
                Some(Intent::Query) => StepName::Schema,
                _ => StepName::End,
            },
            StepName::Ambiguity => match state.intent() {
                Some(Intent::Query) => StepName::Schema,
                _ => StepName::End,
            },
            StepName::Schema if self.reasoning => StepName::Reasoning,
            StepName::Schema | StepName::Reasoning => StepName::Query,
            StepName::Query | StepName::Execute if state.query_error().is_some() => {
                if self.can_retry(state) {
                    StepName::Query
                } else {
                    StepName::End
                }
            }
            StepName::Query => StepName::Execute,
            StepName::Execute => StepName::Chart,
            StepName::Chart => StepName::Diagnosis,
            StepName::Diagnosis => StepName::Answer,
            StepName::Answer | StepName::End => StepName::End,
        }
    }

    pub fn can_retry(&self, state: &SessionState) -> bool {
        state.retry_count() < self.max_retries
    }

    /// True when `from` failed on the query path and no retry is left
    pub fn is_retry_exhausted(&self, from: StepName, state: &SessionState) -> bool {
        from.is_query_path() && state.query_error().is_some() && !self.can_retry(state)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::from_config(&OrchestratorConfig::default())
    }
}
