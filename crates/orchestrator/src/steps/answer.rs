use async_trait::async_trait;
use chatbi_core::{SessionState, StateDelta, StepName};
use futures::StreamExt;

use crate::collaborators::{AnswerRequest, CollaboratorResult};
use crate::core::{Step, StepContext, StepResult};
use crate::error::{Result, StepError};

/// Streams the final answer. Each chunk is forwarded as an `answer.chunk`
/// event before the step completes; the timeout covers the whole stream.
pub struct AnswerStep;

#[async_trait]
impl Step for AnswerStep {
    fn name(&self) -> StepName {
        StepName::Answer
    }

    async fn execute(&self, state: &SessionState, ctx: &StepContext<'_>) -> Result<StepResult> {
        let request = AnswerRequest {
            question: state.question(),
            rows: state.result_rows().unwrap_or_default(),
            chart_spec: state.chart_spec(),
            diagnosis: state.diagnosis(),
            language: state.language(),
        };
        let synthesizer = &ctx.collaborators().answer;

        let streamed = async {
            let mut chunks = synthesizer.synthesize(&request).await?;
            let mut answer = String::new();
            while let Some(chunk) = chunks.next().await {
                let chunk = chunk?;
                if chunk.is_empty() {
                    continue;
                }
                ctx.emit_chunk(chunk.as_str()).await;
                answer.push_str(&chunk);
            }
            CollaboratorResult::Ok(answer)
        };

        let answer = match ctx.invoke(streamed).await {
            Ok(answer) => answer,
            Err(error) => return Ok(StepResult::failure(self.name(), error)),
        };
        if answer.trim().is_empty() {
            return Ok(StepResult::failure(
                self.name(),
                StepError::invalid_output(self.name(), "synthesizer returned an empty answer"),
            ));
        }

        let note = format!("Answer composed ({} chars)", answer.chars().count());
        Ok(StepResult::success(
            StateDelta::new()
                .with_answer(answer)
                .with_message(self.name(), note),
        ))
    }
}
