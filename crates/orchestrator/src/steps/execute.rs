use async_trait::async_trait;
use chatbi_core::{SessionState, StateDelta, StepName};

use crate::core::{Step, StepContext, StepResult};
use crate::error::{OrchestratorError, Result};

/// Runs the generated query. Its failures drive the retry loop.
pub struct ExecuteStep;

#[async_trait]
impl Step for ExecuteStep {
    fn name(&self) -> StepName {
        StepName::Execute
    }

    async fn execute(&self, state: &SessionState, ctx: &StepContext<'_>) -> Result<StepResult> {
        let query = state
            .generated_query()
            .ok_or_else(|| OrchestratorError::fatal(self.name(), "no generated query to execute"))?;

        let executor = &ctx.collaborators().executor;
        match ctx.invoke(executor.execute(query)).await {
            Ok(rows) => {
                let note = format!("Query returned {} rows", rows.len());
                Ok(StepResult::success(
                    StateDelta::new()
                        .with_result_rows(rows)
                        .clear_query_error()
                        .with_message(self.name(), note),
                ))
            }
            Err(error) => Ok(StepResult::failure(self.name(), error)),
        }
    }
}
