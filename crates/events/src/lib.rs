//! Event types and transports for ChatBI sessions.
//!
//! Each session owns a bounded [`channel`] with the orchestrator as the only
//! producer. The process-wide [`EventBus`] is an optional broadcast tap that
//! mirrors every session's envelopes for monitoring.

mod bus;
mod channel;
mod types;

pub use bus::EventBus;
pub use channel::{channel, EventSender, EventStream, DEFAULT_CHANNEL_CAPACITY};
pub use types::*;
