use async_trait::async_trait;
use chatbi_core::Row;
use orchestrator::collaborators::{CollaboratorResult, QueryExecutor};
use serde_json::json;
use tracing::info;

const DEMO_ROWS: &[(&str, f64)] = &[
    ("Laptop", 1500.00),
    ("Mouse", 450.50),
    ("Keyboard", 320.00),
    ("Monitor", 890.00),
    ("Headphones", 210.00),
];

/// Answers every query with a fixed product/sales result set.
///
/// Used when no database is configured so the rest of the pipeline can
/// still be exercised end to end.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoQueryExecutor;

impl DemoQueryExecutor {
    pub fn rows() -> Vec<Row> {
        DEMO_ROWS
            .iter()
            .filter_map(|(name, sales)| {
                json!({"product_name": name, "sales": sales})
                    .as_object()
                    .cloned()
            })
            .collect()
    }
}

#[async_trait]
impl QueryExecutor for DemoQueryExecutor {
    async fn execute(&self, query: &str) -> CollaboratorResult<Vec<Row>> {
        info!(query = %query, "Demo mode, returning sample rows");
        Ok(Self::rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_rows_ignore_query() {
        let rows = DemoQueryExecutor.execute("SELECT * FROM anything").await.unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0]["product_name"], "Laptop");
        assert_eq!(rows[0]["sales"], 1500.0);
        assert_eq!(rows[4]["product_name"], "Headphones");
    }
}
