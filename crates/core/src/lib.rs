//! Domain model for the ChatBI orchestration engine.
//!
//! Everything a single question carries through the pipeline lives here:
//! the [`SessionState`] record, the sparse [`StateDelta`] steps return, and
//! the closed enumerations ([`Intent`], [`StepName`]) the router matches on.

pub mod domain;
mod error;

pub use domain::*;
pub use error::{CoreError, Result};
