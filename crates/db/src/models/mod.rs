mod session;

pub use session::{SessionRecord, SessionRow};
