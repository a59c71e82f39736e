use std::collections::HashMap;
use std::time::Duration;

use chatbi_core::{StepName, TableSchema, DEFAULT_LANGUAGE, DEFAULT_MAX_RETRIES};
use events::DEFAULT_CHANNEL_CAPACITY;
use std::sync::Arc;

pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Process-wide orchestration settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_retries: u32,
    pub step_timeout: Duration,
    pub step_timeouts: HashMap<StepName, Duration>,
    pub enable_ambiguity_check: bool,
    pub enable_reasoning: bool,
    pub event_capacity: usize,
    pub default_language: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            step_timeout: DEFAULT_STEP_TIMEOUT,
            step_timeouts: HashMap::new(),
            enable_ambiguity_check: false,
            enable_reasoning: false,
            event_capacity: DEFAULT_CHANNEL_CAPACITY,
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Override the timeout of a single step
    pub fn with_timeout_for(mut self, step: StepName, timeout: Duration) -> Self {
        self.step_timeouts.insert(step, timeout);
        self
    }

    pub fn with_ambiguity_check(mut self, enabled: bool) -> Self {
        self.enable_ambiguity_check = enabled;
        self
    }

    pub fn with_reasoning(mut self, enabled: bool) -> Self {
        self.enable_reasoning = enabled;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }

    pub fn timeout_for(&self, step: StepName) -> Duration {
        self.step_timeouts
            .get(&step)
            .copied()
            .unwrap_or(self.step_timeout)
    }

    /// Hard cap on executed steps per session: every step once plus one
    /// query/execute pair per allowed retry.
    pub fn step_budget(&self) -> usize {
        StepName::EXECUTABLE.len() + 2 * self.max_retries as usize
    }
}

/// Per-run overrides passed to `Orchestrator::run`
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub session_id: Option<String>,
    pub language: Option<String>,
    pub table_schemas: Option<Arc<Vec<TableSchema>>>,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_table_schemas(mut self, schemas: Arc<Vec<TableSchema>>) -> Self {
        self.table_schemas = Some(schemas);
        self
    }
}
