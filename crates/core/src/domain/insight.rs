use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One result row: column name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Visualization configuration produced by the chart advisor.
pub type ChartSpec = serde_json::Map<String, serde_json::Value>;

/// Insights extracted from a query result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct InsightSummary {
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    0.7
}

impl InsightSummary {
    pub fn new(summary: impl Into<String>, key_points: Vec<String>, confidence: f32) -> Self {
        Self {
            summary: summary.into(),
            key_points,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        let insight = InsightSummary::new("Sales grew", vec![], 1.7);
        assert_eq!(insight.confidence, 1.0);
    }

    #[test]
    fn test_confidence_defaults_when_missing() {
        let insight: InsightSummary =
            serde_json::from_str(r#"{"summary": "Flat", "key_points": ["a"]}"#).unwrap();
        assert_eq!(insight.confidence, 0.7);
        assert_eq!(insight.key_points, vec!["a".to_string()]);
    }
}
