use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            description: None,
        }
    }
}

/// A table from the read-only schema catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct TableSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            columns: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_column(mut self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        self.columns.push(ColumnSchema::new(name, data_type));
        self
    }

    /// Compact DDL-like rendering used in prompts and logs.
    pub fn to_ddl(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("  {} {}", c.name, c.data_type))
            .collect::<Vec<_>>()
            .join(",\n");
        match &self.description {
            Some(description) => format!(
                "-- {}\nCREATE TABLE {} (\n{}\n);",
                description, self.name, columns
            ),
            None => format!("CREATE TABLE {} (\n{}\n);", self.name, columns),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_builder_and_ddl() {
        let table = TableSchema::new("orders")
            .with_description("Customer orders")
            .with_column("id", "INTEGER")
            .with_column("total_amount", "REAL");

        let ddl = table.to_ddl();
        assert!(ddl.starts_with("-- Customer orders"));
        assert!(ddl.contains("CREATE TABLE orders"));
        assert!(ddl.contains("  total_amount REAL"));
    }

    #[test]
    fn test_column_type_field_name() {
        let json = r#"{"name": "products", "columns": [{"name": "price", "type": "REAL"}]}"#;
        let table: TableSchema = serde_json::from_str(json).unwrap();
        assert_eq!(table.columns[0].data_type, "REAL");
        assert!(table.description.is_none());
    }
}
