use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chatbi_core::{ColumnSchema, Row, TableSchema};
use futures::{StreamExt, TryStreamExt};
use orchestrator::collaborators::{CollaboratorResult, QueryExecutor};
use orchestrator::CollaboratorError;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use tracing::{debug, warn};

/// Rows returned per query unless configured otherwise
pub const DEFAULT_MAX_ROWS: usize = 1000;

/// Runs generated queries against a SQLite database.
///
/// Only single `SELECT`/`WITH` statements are accepted, and connections
/// opened through [`SqliteQueryExecutor::connect`] are read-only.
#[derive(Debug, Clone)]
pub struct SqliteQueryExecutor {
    pool: SqlitePool,
    max_rows: usize,
}

impl SqliteQueryExecutor {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .read_only(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows.max(1);
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Describe every user table, for use as the schema catalog.
    pub async fn load_catalog(&self) -> Result<Vec<TableSchema>, sqlx::Error> {
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master \
             WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut catalog = Vec::with_capacity(tables.len());
        for table in tables {
            let columns: Vec<(String, String)> =
                sqlx::query_as("SELECT name, type FROM pragma_table_info(?) ORDER BY cid")
                    .bind(&table)
                    .fetch_all(&self.pool)
                    .await?;
            catalog.push(TableSchema {
                name: table,
                description: None,
                columns: columns
                    .into_iter()
                    .map(|(name, data_type)| ColumnSchema::new(name, data_type))
                    .collect(),
            });
        }
        Ok(catalog)
    }
}

/// Reject anything but a single read-only statement.
///
/// Semicolons inside quoted literals or identifiers do not separate
/// statements. Comments are not parsed, so a `;` inside one is rejected.
pub fn ensure_read_only(query: &str) -> Result<&str, String> {
    let statement = query.trim().trim_end_matches(';').trim_end();
    if statement.is_empty() {
        return Err("empty query".to_string());
    }
    if has_statement_separator(statement) {
        return Err("multiple statements are not allowed".to_string());
    }

    let keyword = statement
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    match keyword.as_str() {
        "SELECT" | "WITH" => Ok(statement),
        other => Err(format!("only SELECT queries are allowed, got {}", other)),
    }
}

/// `;` outside `'...'`, `"..."` and `` `...` `` sections. Doubled quotes
/// used as escapes toggle twice, which leaves the state unchanged.
fn has_statement_separator(statement: &str) -> bool {
    let mut quote: Option<char> = None;
    for c in statement.chars() {
        match (quote, c) {
            (None, '\'' | '"' | '`') => quote = Some(c),
            (None, ';') => return true,
            (Some(open), c) if c == open => quote = None,
            _ => {}
        }
    }
    false
}

fn execution_error(error: sqlx::Error) -> CollaboratorError {
    match error {
        sqlx::Error::Database(db_error) => CollaboratorError::Execution(db_error.message().to_string()),
        other => CollaboratorError::Execution(other.to_string()),
    }
}

fn row_to_json(row: &SqliteRow) -> Row {
    let mut map = Row::new();

    for (index, column) in row.columns().iter().enumerate() {
        let value = match row.try_get_raw(index) {
            Ok(raw) if !raw.is_null() => {
                let type_name = raw.type_info().name().to_string();
                decode_value(row, index, &type_name)
            }
            _ => Value::Null,
        };
        map.insert(column.name().to_string(), value);
    }

    map
}

fn decode_value(row: &SqliteRow, index: usize, type_name: &str) -> Value {
    match type_name {
        "INTEGER" | "BOOLEAN" => row
            .try_get::<i64, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "REAL" | "NUMERIC" => row
            .try_get::<f64, _>(index)
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|bytes| Value::String(format!("<{} bytes>", bytes.len())))
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<String, _>(index)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

#[async_trait]
impl QueryExecutor for SqliteQueryExecutor {
    async fn execute(&self, query: &str) -> CollaboratorResult<Vec<Row>> {
        let statement = ensure_read_only(query).map_err(CollaboratorError::Execution)?;
        debug!(query = %statement, "Executing query");

        let rows: Vec<SqliteRow> = sqlx::query(statement)
            .fetch(&self.pool)
            .take(self.max_rows)
            .try_collect()
            .await
            .map_err(|e| {
                warn!(error = %e, "Query execution failed");
                execution_error(e)
            })?;

        debug!(rows = rows.len(), "Query returned");
        Ok(rows.iter().map(row_to_json).collect())
    }
}
