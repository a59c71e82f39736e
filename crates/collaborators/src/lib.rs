//! Concrete collaborators for the ChatBI orchestrator.
//!
//! - [`LlmClient`] - OpenAI-compatible chat-completions client with retry and streaming
//! - [`LlmAgents`] - every text-generation collaborator backed by one client
//! - [`SqliteQueryExecutor`] - read-only query execution over a SQLite pool
//! - [`DemoQueryExecutor`] - fixed sample data when no database is configured

pub mod agents;
pub mod error;
pub mod executor;
pub mod llm;

pub use agents::LlmAgents;
pub use error::{LlmError, LlmResult};
pub use executor::{DemoQueryExecutor, SqliteQueryExecutor};
pub use llm::{ChatMessage, LlmClient, LlmConfig, Role};
