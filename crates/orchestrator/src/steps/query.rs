use async_trait::async_trait;
use chatbi_core::{SessionState, StateDelta, StepName};

use crate::collaborators::QueryRequest;
use crate::core::{Step, StepContext, StepResult};
use crate::error::{OrchestratorError, Result, StepError};
use crate::retry::Correction;

/// Generates a query, or a corrected one when the previous attempt failed.
pub struct QueryStep;

#[async_trait]
impl Step for QueryStep {
    fn name(&self) -> StepName {
        StepName::Query
    }

    async fn execute(&self, state: &SessionState, ctx: &StepContext<'_>) -> Result<StepResult> {
        let schemas = state
            .selected_schemas()
            .ok_or_else(|| OrchestratorError::fatal(self.name(), "schema selection has not run"))?;
        let correction = Correction::from_state(state);

        let request = QueryRequest {
            question: state.question(),
            schemas,
            reasoning: state.reasoning(),
            correction: correction.as_ref(),
        };

        let generator = &ctx.collaborators().query;
        let query = match ctx.invoke(generator.generate(&request)).await {
            Ok(query) => query.trim().to_string(),
            Err(error) => return Ok(StepResult::failure(self.name(), error)),
        };
        if query.is_empty() {
            return Ok(StepResult::failure(
                self.name(),
                StepError::invalid_output(self.name(), "generator returned an empty query"),
            ));
        }

        let note = match &correction {
            Some(c) => format!("Corrected query (attempt {})", c.attempt),
            None => "Generated query".to_string(),
        };

        Ok(StepResult::success(
            StateDelta::new()
                .with_generated_query(query)
                .clear_query_error()
                .with_message(self.name(), note),
        ))
    }
}
