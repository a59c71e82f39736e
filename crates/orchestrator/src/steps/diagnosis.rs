use async_trait::async_trait;
use chatbi_core::{SessionState, StateDelta, StepName};

use crate::collaborators::DiagnosisRequest;
use crate::core::{Step, StepContext, StepResult};
use crate::error::{OrchestratorError, Result};

/// Rows handed to the diagnosis generator, taken from the head of the result
pub const DIAGNOSIS_SAMPLE_ROWS: usize = 20;

pub struct DiagnosisStep;

#[async_trait]
impl Step for DiagnosisStep {
    fn name(&self) -> StepName {
        StepName::Diagnosis
    }

    async fn execute(&self, state: &SessionState, ctx: &StepContext<'_>) -> Result<StepResult> {
        let rows = state
            .result_rows()
            .ok_or_else(|| OrchestratorError::fatal(self.name(), "no query result to diagnose"))?;
        let sample = &rows[..rows.len().min(DIAGNOSIS_SAMPLE_ROWS)];

        let request = DiagnosisRequest {
            question: state.question(),
            query: state.generated_query().unwrap_or_default(),
            rows: sample,
            language: state.language(),
        };

        let generator = &ctx.collaborators().diagnosis;
        match ctx.invoke(generator.diagnose(&request)).await {
            Ok(insight) => {
                let note = format!("Extracted {} key points", insight.key_points.len());
                Ok(StepResult::success(
                    StateDelta::new()
                        .with_diagnosis(insight)
                        .with_message(self.name(), note),
                ))
            }
            Err(error) => Ok(StepResult::failure(self.name(), error)),
        }
    }
}
