use async_trait::async_trait;
use chatbi_core::{SessionState, StateDelta, StepName, TableSchema};
use tracing::warn;

use crate::core::{Step, StepContext, StepResult};
use crate::error::Result;

/// Narrows the catalog to the tables relevant to the question.
///
/// The selection is re-resolved against the catalog by name: tables the
/// selector invented are dropped, and duplicates collapse.
pub struct SchemaStep;

#[async_trait]
impl Step for SchemaStep {
    fn name(&self) -> StepName {
        StepName::Schema
    }

    async fn execute(&self, state: &SessionState, ctx: &StepContext<'_>) -> Result<StepResult> {
        let candidates = state.table_schemas();
        let selector = &ctx.collaborators().schema;
        let selected = match ctx
            .invoke(selector.select(state.question(), candidates))
            .await
        {
            Ok(selected) => selected,
            Err(error) => return Ok(StepResult::failure(self.name(), error)),
        };

        let mut resolved: Vec<TableSchema> = Vec::with_capacity(selected.len());
        for table in selected {
            if resolved.iter().any(|t| t.name == table.name) {
                continue;
            }
            match candidates.iter().find(|c| c.name == table.name) {
                Some(known) => resolved.push(known.clone()),
                None => warn!(table = %table.name, "Schema selector returned unknown table, ignoring"),
            }
        }

        let names: Vec<&str> = resolved.iter().map(|t| t.name.as_str()).collect();
        let note = if names.is_empty() {
            "No relevant tables selected".to_string()
        } else {
            format!("Selected {} relevant tables: {}", names.len(), names.join(", "))
        };

        Ok(StepResult::success(
            StateDelta::new()
                .with_selected_schemas(resolved)
                .with_message(self.name(), note),
        ))
    }
}
