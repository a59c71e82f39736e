use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::insight::{ChartSpec, InsightSummary, Row};
use super::intent::{AmbiguityInfo, Intent};
use super::schema::TableSchema;
use super::step::StepName;

/// Update instruction for one optional Session State field.
///
/// `Keep` leaves the slot untouched, `Set` replaces whatever was there
/// (last writer wins, including on retries), `Clear` resets it to unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum FieldUpdate<T> {
    Keep,
    Set(T),
    Clear,
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        Self::Keep
    }
}

impl<T> FieldUpdate<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Self::Set(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn apply_to(self, slot: &mut Option<T>) {
        match self {
            Self::Keep => {}
            Self::Set(value) => *slot = Some(value),
            Self::Clear => *slot = None,
        }
    }
}

/// One line of the append-only trace log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceMessage {
    pub step: StepName,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl TraceMessage {
    pub fn new(step: StepName, content: impl Into<String>) -> Self {
        Self {
            step,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Sparse set of Session State changes produced by one step invocation.
///
/// Unset fields serialize to nothing, so an emitted event carries only what
/// the step actually touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub intent: FieldUpdate<Intent>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub intent_confidence: FieldUpdate<f32>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub ambiguity: FieldUpdate<AmbiguityInfo>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub selected_schemas: FieldUpdate<Vec<TableSchema>>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub reasoning: FieldUpdate<String>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub generated_query: FieldUpdate<String>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub query_error: FieldUpdate<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub result_rows: FieldUpdate<Vec<Row>>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub chart_spec: FieldUpdate<ChartSpec>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub diagnosis: FieldUpdate<InsightSummary>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub answer: FieldUpdate<String>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub error: FieldUpdate<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<TraceMessage>,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = FieldUpdate::Set(intent);
        self
    }

    pub fn with_intent_confidence(mut self, confidence: f32) -> Self {
        self.intent_confidence = FieldUpdate::Set(confidence.clamp(0.0, 1.0));
        self
    }

    pub fn with_ambiguity(mut self, info: AmbiguityInfo) -> Self {
        self.ambiguity = FieldUpdate::Set(info);
        self
    }

    pub fn with_selected_schemas(mut self, schemas: Vec<TableSchema>) -> Self {
        self.selected_schemas = FieldUpdate::Set(schemas);
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = FieldUpdate::Set(reasoning.into());
        self
    }

    pub fn with_generated_query(mut self, query: impl Into<String>) -> Self {
        self.generated_query = FieldUpdate::Set(query.into());
        self
    }

    pub fn with_query_error(mut self, error: impl Into<String>) -> Self {
        self.query_error = FieldUpdate::Set(error.into());
        self
    }

    pub fn clear_query_error(mut self) -> Self {
        self.query_error = FieldUpdate::Clear;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn with_result_rows(mut self, rows: Vec<Row>) -> Self {
        self.result_rows = FieldUpdate::Set(rows);
        self
    }

    pub fn with_chart_spec(mut self, spec: ChartSpec) -> Self {
        self.chart_spec = FieldUpdate::Set(spec);
        self
    }

    pub fn with_diagnosis(mut self, diagnosis: InsightSummary) -> Self {
        self.diagnosis = FieldUpdate::Set(diagnosis);
        self
    }

    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = FieldUpdate::Set(answer.into());
        self
    }

    pub fn clear_answer(mut self) -> Self {
        self.answer = FieldUpdate::Clear;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = FieldUpdate::Set(error.into());
        self
    }

    pub fn with_message(mut self, step: StepName, content: impl Into<String>) -> Self {
        self.messages.push(TraceMessage::new(step, content));
        self
    }

    /// Names of the fields this delta changes, for logging.
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        let checks: [(&'static str, bool); 13] = [
            ("intent", !self.intent.is_keep()),
            ("intent_confidence", !self.intent_confidence.is_keep()),
            ("ambiguity", !self.ambiguity.is_keep()),
            ("selected_schemas", !self.selected_schemas.is_keep()),
            ("reasoning", !self.reasoning.is_keep()),
            ("generated_query", !self.generated_query.is_keep()),
            ("query_error", !self.query_error.is_keep()),
            ("retry_count", self.retry_count.is_some()),
            ("result_rows", !self.result_rows.is_keep()),
            ("chart_spec", !self.chart_spec.is_keep()),
            ("diagnosis", !self.diagnosis.is_keep()),
            ("answer", !self.answer.is_keep()),
            ("error", !self.error.is_keep()),
        ];
        for (name, touched) in checks {
            if touched {
                fields.push(name);
            }
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.touched_fields().is_empty() && self.messages.is_empty()
    }
}
