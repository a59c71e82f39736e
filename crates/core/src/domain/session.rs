use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::delta::{StateDelta, TraceMessage};
use super::insight::{ChartSpec, InsightSummary, Row};
use super::intent::{AmbiguityInfo, Intent};
use super::schema::TableSchema;
use super::step::StepName;
use crate::error::{CoreError, Result};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_LANGUAGE: &str = "zh-CN";

/// How a session reached its terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// The answer step produced a final answer.
    Completed,
    /// A non-query intent short-circuited the pipeline.
    EndedEarly,
    /// A recovered failure (or retry exhaustion) ended the session with `error`.
    Failed,
    Cancelled,
    /// A step's own logic failed; the session was aborted without routing.
    Fatal,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::EndedEarly => "ended_early",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Fatal => "fatal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "ended_early" => Some(Self::EndedEarly),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            "fatal" => Some(Self::Fatal),
            _ => None,
        }
    }
}

/// The mutable record threaded through one question's execution.
///
/// Fields are private: the only way to change a live state is
/// [`SessionState::apply`] with a [`StateDelta`], and [`SessionState::finish`]
/// freezes it for good.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    question: String,
    session_id: Option<String>,
    language: String,
    table_schemas: Arc<Vec<TableSchema>>,
    max_retries: u32,

    intent: Option<Intent>,
    intent_confidence: Option<f32>,
    ambiguity: Option<AmbiguityInfo>,
    selected_schemas: Option<Vec<TableSchema>>,
    reasoning: Option<String>,
    generated_query: Option<String>,
    query_error: Option<String>,
    retry_count: u32,
    result_rows: Option<Vec<Row>>,
    chart_spec: Option<ChartSpec>,
    diagnosis: Option<InsightSummary>,
    answer: Option<String>,
    error: Option<String>,
    should_stop: bool,

    messages: Vec<TraceMessage>,
    outcome: Option<SessionOutcome>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Create a fresh state. Rejects blank questions.
    pub fn new(question: impl Into<String>) -> Result<Self> {
        let question = question.into();
        if question.trim().is_empty() {
            return Err(CoreError::Validation("question must not be empty".to_string()));
        }

        Ok(Self {
            question,
            session_id: None,
            language: DEFAULT_LANGUAGE.to_string(),
            table_schemas: Arc::new(Vec::new()),
            max_retries: DEFAULT_MAX_RETRIES,
            intent: None,
            intent_confidence: None,
            ambiguity: None,
            selected_schemas: None,
            reasoning: None,
            generated_query: None,
            query_error: None,
            retry_count: 0,
            result_rows: None,
            chart_spec: None,
            diagnosis: None,
            answer: None,
            error: None,
            should_stop: false,
            messages: Vec::new(),
            outcome: None,
            started_at: Utc::now(),
            finished_at: None,
        })
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_table_schemas(mut self, schemas: Arc<Vec<TableSchema>>) -> Self {
        self.table_schemas = schemas;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn table_schemas(&self) -> &[TableSchema] {
        &self.table_schemas
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn intent(&self) -> Option<Intent> {
        self.intent
    }

    pub fn intent_confidence(&self) -> Option<f32> {
        self.intent_confidence
    }

    pub fn ambiguity(&self) -> Option<&AmbiguityInfo> {
        self.ambiguity.as_ref()
    }

    pub fn selected_schemas(&self) -> Option<&[TableSchema]> {
        self.selected_schemas.as_deref()
    }

    pub fn reasoning(&self) -> Option<&str> {
        self.reasoning.as_deref()
    }

    pub fn generated_query(&self) -> Option<&str> {
        self.generated_query.as_deref()
    }

    pub fn query_error(&self) -> Option<&str> {
        self.query_error.as_deref()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn result_rows(&self) -> Option<&[Row]> {
        self.result_rows.as_deref()
    }

    pub fn chart_spec(&self) -> Option<&ChartSpec> {
        self.chart_spec.as_ref()
    }

    pub fn diagnosis(&self) -> Option<&InsightSummary> {
        self.diagnosis.as_ref()
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn should_stop(&self) -> bool {
        self.should_stop
    }

    pub fn messages(&self) -> &[TraceMessage] {
        &self.messages
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.outcome
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Merge a step's delta field by field.
    ///
    /// Optional fields are last-writer-wins, `messages` is append-only and
    /// `retry_count` may only grow up to `max_retries`. The delta is validated
    /// in full before anything is written, so a rejected delta leaves the
    /// state untouched.
    pub fn apply(&mut self, delta: StateDelta) -> Result<()> {
        if self.should_stop {
            return Err(CoreError::SessionTerminated(
                self.session_id.clone().unwrap_or_default(),
            ));
        }

        if let Some(proposed) = delta.retry_count {
            if proposed < self.retry_count {
                return Err(CoreError::RetryCountDecreased {
                    current: self.retry_count,
                    proposed,
                });
            }
            if proposed > self.max_retries {
                return Err(CoreError::RetryCountExceeded {
                    proposed,
                    max: self.max_retries,
                });
            }
        }

        if let Some(selected) = delta.selected_schemas.as_set() {
            for table in selected {
                if !self.table_schemas.iter().any(|t| t.name == table.name) {
                    return Err(CoreError::UnknownTable {
                        step: StepName::Schema,
                        table: table.name.clone(),
                    });
                }
            }
        }

        let StateDelta {
            intent,
            intent_confidence,
            ambiguity,
            selected_schemas,
            reasoning,
            generated_query,
            query_error,
            retry_count,
            result_rows,
            chart_spec,
            diagnosis,
            answer,
            error,
            messages,
        } = delta;

        intent.apply_to(&mut self.intent);
        intent_confidence.apply_to(&mut self.intent_confidence);
        ambiguity.apply_to(&mut self.ambiguity);
        selected_schemas.apply_to(&mut self.selected_schemas);
        reasoning.apply_to(&mut self.reasoning);
        generated_query.apply_to(&mut self.generated_query);
        query_error.apply_to(&mut self.query_error);
        if let Some(count) = retry_count {
            self.retry_count = count;
        }
        result_rows.apply_to(&mut self.result_rows);
        chart_spec.apply_to(&mut self.chart_spec);
        diagnosis.apply_to(&mut self.diagnosis);
        answer.apply_to(&mut self.answer);
        error.apply_to(&mut self.error);
        self.messages.extend(messages);

        Ok(())
    }

    /// Freeze the state. No delta can be applied afterwards.
    pub fn finish(&mut self, outcome: SessionOutcome) -> Result<()> {
        if self.should_stop {
            return Err(CoreError::SessionTerminated(
                self.session_id.clone().unwrap_or_default(),
            ));
        }
        self.should_stop = true;
        self.outcome = Some(outcome);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Outcome implied by the current fields, ignoring cancellation and fatal aborts.
    pub fn implied_outcome(&self) -> SessionOutcome {
        if self.error.is_some() {
            SessionOutcome::Failed
        } else if self.answer.is_some() {
            SessionOutcome::Completed
        } else {
            SessionOutcome::EndedEarly
        }
    }
}
