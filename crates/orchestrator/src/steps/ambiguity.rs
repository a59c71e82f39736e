use async_trait::async_trait;
use chatbi_core::{Intent, SessionState, StateDelta, StepName};

use crate::core::{Step, StepContext, StepResult};
use crate::error::{OrchestratorError, Result};

/// Optional gate after intent classification. An ambiguous question is
/// turned into a `clarification` intent carrying the follow-up question.
pub struct AmbiguityStep;

#[async_trait]
impl Step for AmbiguityStep {
    fn name(&self) -> StepName {
        StepName::Ambiguity
    }

    async fn execute(&self, state: &SessionState, ctx: &StepContext<'_>) -> Result<StepResult> {
        let checker = ctx
            .collaborators()
            .ambiguity
            .as_ref()
            .ok_or_else(|| OrchestratorError::fatal(self.name(), "no ambiguity checker configured"))?;

        let assessment = match ctx.invoke(checker.check(state.question())).await {
            Ok(assessment) => assessment,
            Err(error) => return Ok(StepResult::failure(self.name(), error)),
        };

        let delta = match assessment.into_info() {
            Some(info) => {
                let note = match &info.clarification_question {
                    Some(question) => format!("Needs clarification: {}", question),
                    None => "Needs clarification".to_string(),
                };
                StateDelta::new()
                    .with_intent(Intent::Clarification)
                    .with_ambiguity(info)
                    .with_message(self.name(), note)
            }
            None => StateDelta::new().with_message(self.name(), "Question is specific enough"),
        };

        Ok(StepResult::success(delta))
    }
}
