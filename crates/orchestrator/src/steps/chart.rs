use async_trait::async_trait;
use chatbi_core::{SessionState, StateDelta, StepName};

use crate::core::{Step, StepContext, StepResult};
use crate::error::{OrchestratorError, Result};

pub struct ChartStep;

#[async_trait]
impl Step for ChartStep {
    fn name(&self) -> StepName {
        StepName::Chart
    }

    async fn execute(&self, state: &SessionState, ctx: &StepContext<'_>) -> Result<StepResult> {
        let rows = state
            .result_rows()
            .ok_or_else(|| OrchestratorError::fatal(self.name(), "no query result to chart"))?;

        let advisor = &ctx.collaborators().chart;
        match ctx.invoke(advisor.advise(state.question(), rows)).await {
            Ok(spec) => {
                let kind = spec
                    .get("type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unspecified")
                    .to_string();
                Ok(StepResult::success(
                    StateDelta::new()
                        .with_chart_spec(spec)
                        .with_message(self.name(), format!("Suggested {} chart", kind)),
                ))
            }
            Err(error) => Ok(StepResult::failure(self.name(), error)),
        }
    }
}
