//! Core abstractions for step execution.
//!
//! - [`Step`] - Trait every pipeline step implements
//! - [`StepContext`] - What a step may touch while it runs
//! - [`StepResult`] - Delta plus optional recoverable failure
//! - [`OrderedEventEmitter`] - Per-session emitter with gapless sequence numbers

mod events;
mod step;

pub use events::OrderedEventEmitter;
pub use step::{Step, StepContext, StepResult};
