mod client;
mod types;

pub use client::{LlmClient, LlmConfig};
pub use types::*;
