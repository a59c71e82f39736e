use async_trait::async_trait;
use chatbi_core::{SessionState, StateDelta, StepName};

use crate::core::{Step, StepContext, StepResult};
use crate::error::{OrchestratorError, Result};

/// Optional planning pass between schema selection and query generation
pub struct ReasoningStep;

#[async_trait]
impl Step for ReasoningStep {
    fn name(&self) -> StepName {
        StepName::Reasoning
    }

    async fn execute(&self, state: &SessionState, ctx: &StepContext<'_>) -> Result<StepResult> {
        let reasoner = ctx
            .collaborators()
            .reasoner
            .as_ref()
            .ok_or_else(|| OrchestratorError::fatal(self.name(), "no query reasoner configured"))?;
        let schemas = state
            .selected_schemas()
            .ok_or_else(|| OrchestratorError::fatal(self.name(), "schema selection has not run"))?;

        match ctx.invoke(reasoner.reason(state.question(), schemas)).await {
            Ok(reasoning) => Ok(StepResult::success(
                StateDelta::new()
                    .with_reasoning(reasoning)
                    .with_message(self.name(), "Planned query approach"),
            )),
            Err(error) => Ok(StepResult::failure(self.name(), error)),
        }
    }
}
