mod health;
mod query;
mod sessions;
pub mod sse;

pub use health::*;
pub use query::*;
pub use sessions::*;
