use chatbi_core::{Intent, SessionOutcome, SessionState, TraceMessage};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Audit summary of one finished session
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionRecord {
    pub session_id: String,
    pub question: String,
    pub language: String,
    pub intent: Option<Intent>,
    pub outcome: SessionOutcome,
    pub generated_query: Option<String>,
    pub answer: Option<String>,
    pub error: Option<String>,
    pub retry_count: u32,
    /// Number of rows the last successful execution returned
    pub row_count: Option<u32>,
    #[schema(value_type = Vec<Object>)]
    pub trace: Vec<TraceMessage>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Summarize a terminal state. Returns `None` while the session is still live.
    pub fn from_state(state: &SessionState) -> Option<Self> {
        let outcome = state.outcome()?;
        Some(Self {
            session_id: state.session_id().unwrap_or_default().to_string(),
            question: state.question().to_string(),
            language: state.language().to_string(),
            intent: state.intent(),
            outcome,
            generated_query: state.generated_query().map(str::to_string),
            answer: state.answer().map(str::to_string),
            error: state.error().map(str::to_string),
            retry_count: state.retry_count(),
            row_count: state.result_rows().map(|rows| rows.len() as u32),
            trace: state.messages().to_vec(),
            started_at: state.started_at(),
            finished_at: state.finished_at(),
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub id: String,
    pub question: String,
    pub language: String,
    pub intent: Option<String>,
    pub outcome: String,
    pub generated_query: Option<String>,
    pub answer: Option<String>,
    pub error: Option<String>,
    pub retry_count: i64,
    pub row_count: Option<i64>,
    pub trace: String,
    pub started_at: i64,
    pub finished_at: Option<i64>,
}

impl SessionRow {
    pub fn into_domain(self) -> SessionRecord {
        SessionRecord {
            session_id: self.id,
            question: self.question,
            language: self.language,
            intent: self.intent.as_deref().and_then(Intent::parse),
            outcome: SessionOutcome::parse(&self.outcome).unwrap_or(SessionOutcome::Fatal),
            generated_query: self.generated_query,
            answer: self.answer,
            error: self.error,
            retry_count: self.retry_count.max(0) as u32,
            row_count: self.row_count.map(|n| n.max(0) as u32),
            trace: serde_json::from_str(&self.trace).unwrap_or_default(),
            started_at: millis_to_datetime(self.started_at),
            finished_at: self.finished_at.map(millis_to_datetime),
        }
    }

    pub fn from_record(record: &SessionRecord) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: record.session_id.clone(),
            question: record.question.clone(),
            language: record.language.clone(),
            intent: record.intent.map(|i| i.as_str().to_string()),
            outcome: record.outcome.as_str().to_string(),
            generated_query: record.generated_query.clone(),
            answer: record.answer.clone(),
            error: record.error.clone(),
            retry_count: i64::from(record.retry_count),
            row_count: record.row_count.map(i64::from),
            trace: serde_json::to_string(&record.trace)?,
            started_at: record.started_at.timestamp_millis(),
            finished_at: record.finished_at.map(|dt| dt.timestamp_millis()),
        })
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}
