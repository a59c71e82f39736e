//! Pipeline step implementations.
//!
//! One type per [`StepName`], each delegating to exactly one collaborator.

mod ambiguity;
mod answer;
mod chart;
mod diagnosis;
mod execute;
mod intent;
mod query;
mod reasoning;
mod schema;

use std::collections::HashMap;
use std::sync::Arc;

use chatbi_core::StepName;

use crate::core::Step;

pub use ambiguity::AmbiguityStep;
pub use answer::AnswerStep;
pub use chart::ChartStep;
pub use diagnosis::{DiagnosisStep, DIAGNOSIS_SAMPLE_ROWS};
pub use execute::ExecuteStep;
pub use intent::IntentStep;
pub use query::QueryStep;
pub use reasoning::ReasoningStep;
pub use schema::SchemaStep;

/// Maps step names to implementations
#[derive(Clone)]
pub struct StepRegistry {
    steps: HashMap<StepName, Arc<dyn Step>>,
}

impl StepRegistry {
    pub fn empty() -> Self {
        Self {
            steps: HashMap::new(),
        }
    }

    /// Every executable step with its standard implementation
    pub fn standard() -> Self {
        Self::empty()
            .with_step(Arc::new(IntentStep))
            .with_step(Arc::new(AmbiguityStep))
            .with_step(Arc::new(SchemaStep))
            .with_step(Arc::new(ReasoningStep))
            .with_step(Arc::new(QueryStep))
            .with_step(Arc::new(ExecuteStep))
            .with_step(Arc::new(ChartStep))
            .with_step(Arc::new(DiagnosisStep))
            .with_step(Arc::new(AnswerStep))
    }

    /// Register `step` under its own name, replacing any previous one
    pub fn with_step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.insert(step.name(), step);
        self
    }

    pub fn get(&self, name: StepName) -> Option<Arc<dyn Step>> {
        self.steps.get(&name).cloned()
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_covers_every_step() {
        let registry = StepRegistry::standard();
        for name in StepName::EXECUTABLE {
            let step = registry.get(name).unwrap();
            assert_eq!(step.name(), name);
        }
        assert!(registry.get(StepName::End).is_none());
    }
}
