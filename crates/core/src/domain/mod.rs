mod delta;
mod insight;
mod intent;
mod schema;
mod session;
mod step;

pub use delta::{FieldUpdate, StateDelta, TraceMessage};
pub use insight::{ChartSpec, InsightSummary, Row};
pub use intent::{AmbiguityInfo, AmbiguityKind, ClarificationOption, Intent};
pub use schema::{ColumnSchema, TableSchema};
pub use session::{SessionOutcome, SessionState, DEFAULT_LANGUAGE, DEFAULT_MAX_RETRIES};
pub use step::StepName;
