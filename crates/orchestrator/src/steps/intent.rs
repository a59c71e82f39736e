use async_trait::async_trait;
use chatbi_core::{SessionState, StateDelta, StepName};
use tracing::debug;

use crate::core::{Step, StepContext, StepResult};
use crate::error::Result;

/// Classifies the question; only `query` continues down the data path.
pub struct IntentStep;

#[async_trait]
impl Step for IntentStep {
    fn name(&self) -> StepName {
        StepName::Intent
    }

    async fn execute(&self, state: &SessionState, ctx: &StepContext<'_>) -> Result<StepResult> {
        let classifier = &ctx.collaborators().intent;
        let classification = match ctx.invoke(classifier.classify(state.question())).await {
            Ok(classification) => classification,
            Err(error) => return Ok(StepResult::failure(self.name(), error)),
        };

        debug!(
            intent = %classification.intent,
            confidence = classification.confidence,
            "Intent classified"
        );

        let mut note = format!(
            "Intent: {} (confidence {:.2})",
            classification.intent, classification.confidence
        );
        if !classification.reasoning.trim().is_empty() {
            note.push_str(" - ");
            note.push_str(classification.reasoning.trim());
        }

        Ok(StepResult::success(
            StateDelta::new()
                .with_intent(classification.intent)
                .with_intent_confidence(classification.confidence)
                .with_message(self.name(), note),
        ))
    }
}
