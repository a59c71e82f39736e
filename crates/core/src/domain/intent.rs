use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Classified purpose of a user question.
///
/// Only [`Intent::Query`] continues into schema selection; every other
/// variant terminates the pipeline right after classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Query,
    Greeting,
    Help,
    Clarification,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Greeting => "greeting",
            Self::Help => "help",
            Self::Clarification => "clarification",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "query" => Some(Self::Query),
            "greeting" => Some(Self::Greeting),
            "help" => Some(Self::Help),
            "clarification" => Some(Self::Clarification),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Whether this intent warrants the schema/query/execute pipeline.
    pub fn is_data_question(&self) -> bool {
        matches!(self, Self::Query)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityKind {
    CompletelyVague,
    MultipleInterpretations,
    MissingCriticalContext,
    None,
}

/// One choice offered to the user when a question is ambiguous.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ClarificationOption {
    pub label: String,
    #[serde(default)]
    pub description: String,
}

/// Recorded when the ambiguity step downgrades a query to a clarification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct AmbiguityInfo {
    pub ambiguity_type: AmbiguityKind,
    #[serde(default)]
    pub clarification_question: Option<String>,
    #[serde(default)]
    pub options: Vec<ClarificationOption>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_round_trips_through_str() {
        for intent in [
            Intent::Query,
            Intent::Greeting,
            Intent::Help,
            Intent::Clarification,
            Intent::Unknown,
        ] {
            assert_eq!(Intent::parse(intent.as_str()), Some(intent));
        }
        assert_eq!(Intent::parse("chitchat"), None);
    }

    #[test]
    fn test_only_query_is_data_question() {
        assert!(Intent::Query.is_data_question());
        assert!(!Intent::Greeting.is_data_question());
        assert!(!Intent::Clarification.is_data_question());
    }

    #[test]
    fn test_intent_serializes_snake_case() {
        let json = serde_json::to_string(&Intent::Clarification).unwrap();
        assert_eq!(json, "\"clarification\"");
    }

    #[test]
    fn test_ambiguity_info_accepts_null_question() {
        let info: AmbiguityInfo = serde_json::from_str(
            r#"{"ambiguity_type": "multiple_interpretations", "clarification_question": null}"#,
        )
        .unwrap();
        assert_eq!(info.ambiguity_type, AmbiguityKind::MultipleInterpretations);
        assert!(info.clarification_question.is_none());
        assert!(info.options.is_empty());

        let json = serde_json::to_value(&info).unwrap();
        assert!(json["clarification_question"].is_null());
        let back: AmbiguityInfo = serde_json::from_value(json).unwrap();
        assert_eq!(back, info);

        let missing: AmbiguityInfo =
            serde_json::from_str(r#"{"ambiguity_type": "completely_vague"}"#).unwrap();
        assert!(missing.clarification_question.is_none());
    }
}
