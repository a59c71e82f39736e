//! Session lifecycle resources.

mod session_guard;
mod session_registry;

pub use session_guard::SessionGuard;
pub use session_registry::SessionRegistry;
