mod demo;
mod sqlite;

pub use demo::DemoQueryExecutor;
pub use sqlite::{ensure_read_only, SqliteQueryExecutor, DEFAULT_MAX_ROWS};
