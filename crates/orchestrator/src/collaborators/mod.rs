//! Interfaces of the external services each step delegates to.
//!
//! Every collaborator is a request/response black box that reports failure
//! through [`CollaboratorError`]; none of them see or mutate session state.

mod registry;

use async_trait::async_trait;
use chatbi_core::{
    AmbiguityInfo, AmbiguityKind, ChartSpec, ClarificationOption, InsightSummary, Intent, Row,
    TableSchema,
};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;
use crate::retry::Correction;

pub use registry::{CollaboratorRegistry, CollaboratorRegistryBuilder};

pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

/// Incrementally delivered answer text
pub type AnswerStream = BoxStream<'static, CollaboratorResult<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentClassification {
    pub intent: Intent,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiguityAssessment {
    pub is_ambiguous: bool,
    #[serde(default = "AmbiguityAssessment::default_kind")]
    pub ambiguity_type: AmbiguityKind,
    #[serde(default)]
    pub clarification_question: Option<String>,
    #[serde(default)]
    pub options: Vec<ClarificationOption>,
}

impl AmbiguityAssessment {
    fn default_kind() -> AmbiguityKind {
        AmbiguityKind::None
    }

    pub fn unambiguous() -> Self {
        Self {
            is_ambiguous: false,
            ambiguity_type: AmbiguityKind::None,
            clarification_question: None,
            options: Vec::new(),
        }
    }

    /// The clarification to surface, if the question needs one
    pub fn into_info(self) -> Option<AmbiguityInfo> {
        if !self.is_ambiguous {
            return None;
        }
        Some(AmbiguityInfo {
            ambiguity_type: self.ambiguity_type,
            clarification_question: self.clarification_question,
            options: self.options,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryRequest<'a> {
    pub question: &'a str,
    pub schemas: &'a [TableSchema],
    pub reasoning: Option<&'a str>,
    /// Present on a routed retry: the failed query and why it failed
    pub correction: Option<&'a Correction>,
}

#[derive(Debug, Clone, Copy)]
pub struct DiagnosisRequest<'a> {
    pub question: &'a str,
    pub query: &'a str,
    pub rows: &'a [Row],
    pub language: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct AnswerRequest<'a> {
    pub question: &'a str,
    pub rows: &'a [Row],
    pub chart_spec: Option<&'a ChartSpec>,
    pub diagnosis: Option<&'a InsightSummary>,
    pub language: &'a str,
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, question: &str) -> CollaboratorResult<IntentClassification>;
}

#[async_trait]
pub trait AmbiguityChecker: Send + Sync {
    async fn check(&self, question: &str) -> CollaboratorResult<AmbiguityAssessment>;
}

#[async_trait]
pub trait SchemaSelector: Send + Sync {
    /// Must return a subset of `candidates`; an empty subset is valid.
    async fn select(
        &self,
        question: &str,
        candidates: &[TableSchema],
    ) -> CollaboratorResult<Vec<TableSchema>>;
}

#[async_trait]
pub trait QueryReasoner: Send + Sync {
    async fn reason(&self, question: &str, schemas: &[TableSchema]) -> CollaboratorResult<String>;
}

#[async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn generate(&self, request: &QueryRequest<'_>) -> CollaboratorResult<String>;
}

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &str) -> CollaboratorResult<Vec<Row>>;
}

#[async_trait]
pub trait ChartAdvisor: Send + Sync {
    async fn advise(&self, question: &str, rows: &[Row]) -> CollaboratorResult<ChartSpec>;
}

#[async_trait]
pub trait DiagnosisGenerator: Send + Sync {
    async fn diagnose(&self, request: &DiagnosisRequest<'_>) -> CollaboratorResult<InsightSummary>;
}

#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &AnswerRequest<'_>) -> CollaboratorResult<AnswerStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unambiguous_has_no_info() {
        assert!(AmbiguityAssessment::unambiguous().into_info().is_none());
    }

    #[test]
    fn test_ambiguous_assessment_into_info() {
        let assessment = AmbiguityAssessment {
            is_ambiguous: true,
            ambiguity_type: AmbiguityKind::CompletelyVague,
            clarification_question: Some("Which metric?".to_string()),
            options: vec![],
        };
        let info = assessment.into_info().unwrap();
        assert_eq!(info.ambiguity_type, AmbiguityKind::CompletelyVague);
        assert_eq!(info.clarification_question.as_deref(), Some("Which metric?"));
    }

    #[test]
    fn test_intent_classification_defaults() {
        let parsed: IntentClassification = serde_json::from_str(r#"{"intent": "help"}"#).unwrap();
        assert_eq!(parsed.intent, Intent::Help);
        assert_eq!(parsed.confidence, 0.0);
    }
}
