use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Every unit of pipeline work, plus the terminal pseudo-step [`StepName::End`].
///
/// `Ambiguity` and `Reasoning` are optional and only reachable when enabled
/// in the orchestrator configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Intent,
    Ambiguity,
    Schema,
    Reasoning,
    Query,
    Execute,
    Chart,
    Diagnosis,
    Answer,
    End,
}

impl StepName {
    /// All executable steps in pipeline order.
    pub const EXECUTABLE: [StepName; 9] = [
        StepName::Intent,
        StepName::Ambiguity,
        StepName::Schema,
        StepName::Reasoning,
        StepName::Query,
        StepName::Execute,
        StepName::Chart,
        StepName::Diagnosis,
        StepName::Answer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intent => "intent",
            Self::Ambiguity => "ambiguity",
            Self::Schema => "schema",
            Self::Reasoning => "reasoning",
            Self::Query => "query",
            Self::Execute => "execute",
            Self::Chart => "chart",
            Self::Diagnosis => "diagnosis",
            Self::Answer => "answer",
            Self::End => "end",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "intent" => Some(Self::Intent),
            "ambiguity" => Some(Self::Ambiguity),
            "schema" => Some(Self::Schema),
            "reasoning" => Some(Self::Reasoning),
            "query" => Some(Self::Query),
            "execute" => Some(Self::Execute),
            "chart" => Some(Self::Chart),
            "diagnosis" => Some(Self::Diagnosis),
            "answer" => Some(Self::Answer),
            "end" => Some(Self::End),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End)
    }

    /// Steps whose failures land in `query_error` and feed the retry loop.
    pub fn is_query_path(&self) -> bool {
        matches!(self, Self::Query | Self::Execute)
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_name_parse() {
        assert_eq!(StepName::parse("execute"), Some(StepName::Execute));
        assert_eq!(StepName::parse("end"), Some(StepName::End));
        assert_eq!(StepName::parse("sql"), None);
        for step in StepName::EXECUTABLE {
            assert_eq!(StepName::parse(step.as_str()), Some(step));
            assert!(!step.is_terminal());
        }
    }

    #[test]
    fn test_query_path() {
        assert!(StepName::Query.is_query_path());
        assert!(StepName::Execute.is_query_path());
        assert!(!StepName::Schema.is_query_path());
        assert!(!StepName::Answer.is_query_path());
    }
}
