//! ChatBI orchestration engine.
//!
//! [`Orchestrator::run`] drives a question through the step pipeline
//! (intent, schema, query, execute, chart, diagnosis, answer), routing with
//! [`Router`], bounding query correction with [`RetryController`] and
//! streaming every applied delta as an event.

pub mod collaborators;
pub mod config;
pub mod core;
mod engine;
pub mod error;
pub mod resources;
pub mod retry;
pub mod router;
pub mod steps;

pub use collaborators::{CollaboratorRegistry, CollaboratorRegistryBuilder};
pub use config::{OrchestratorConfig, SessionConfig, DEFAULT_STEP_TIMEOUT};
pub use engine::{Orchestrator, SessionHandle, SessionRun};
pub use error::{CollaboratorError, OrchestratorError, Result, StepError};
pub use retry::{Correction, RetryController};
pub use router::Router;
pub use steps::StepRegistry;
