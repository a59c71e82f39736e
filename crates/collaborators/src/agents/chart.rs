//! Rule-based chart selection.
//!
//! Most result shapes map onto a chart type without asking the model; the
//! LLM is only consulted for analytical questions or shapes the rules do
//! not cover.

use chatbi_core::{ChartSpec, Row};
use serde::Deserialize;
use serde_json::{json, Value};

const TITLE_MAX_CHARS: usize = 50;

const PIE_KEYWORDS: &[&str] = &[
    "proportion",
    "percentage",
    "share",
    "distribution",
    "占比",
    "比例",
];

const ANALYTICAL_KEYWORDS: &[&str] = &[
    "compare",
    "trend",
    "correlation",
    "relationship",
    "analyze",
    "对比",
    "趋势",
    "相关",
    "关系",
    "分析",
];

const TIME_COLUMN_HINTS: &[&str] = &[
    "date", "time", "day", "week", "month", "quarter", "year", "日期", "时间", "月", "年",
];

/// Column roles inferred from result values
#[derive(Debug, Default, PartialEq)]
struct ColumnRoles {
    measures: Vec<String>,
    dimensions: Vec<String>,
    time_dimensions: Vec<String>,
}

impl ColumnRoles {
    fn infer(rows: &[Row]) -> Self {
        let mut roles = Self::default();
        let Some(first) = rows.first() else {
            return roles;
        };

        for column in first.keys() {
            let values: Vec<&Value> = rows
                .iter()
                .filter_map(|row| row.get(column))
                .filter(|value| !value.is_null())
                .collect();

            if is_time_column(column, &values) {
                roles.time_dimensions.push(column.clone());
            } else if !values.is_empty() && values.iter().all(|value| value.is_number()) {
                roles.measures.push(column.clone());
            } else {
                roles.dimensions.push(column.clone());
            }
        }
        roles
    }
}

fn is_time_column(column: &str, values: &[&Value]) -> bool {
    let name = column.to_lowercase();
    if TIME_COLUMN_HINTS.iter().any(|hint| name.contains(hint)) {
        return true;
    }
    !values.is_empty()
        && values
            .iter()
            .all(|value| value.as_str().is_some_and(looks_like_date))
}

/// `YYYY-MM`, `YYYY-MM-DD` and timestamps starting with a date
fn looks_like_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() >= 7
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
}

fn contains_any(question: &str, keywords: &[&str]) -> bool {
    let lower = question.to_lowercase();
    keywords.iter().any(|keyword| lower.contains(keyword))
}

/// Whether the question calls for model-assisted chart selection
pub fn needs_llm(question: &str) -> bool {
    contains_any(question, ANALYTICAL_KEYWORDS)
}

pub fn title_for(question: &str) -> String {
    let question = question.trim();
    if question.chars().count() > TITLE_MAX_CHARS {
        format!(
            "{}...",
            question.chars().take(TITLE_MAX_CHARS).collect::<String>()
        )
    } else {
        question.to_string()
    }
}

fn chart(chart_type: &str, title: String, description: String, spec: Value) -> ChartSpec {
    let mut chart = ChartSpec::new();
    chart.insert("chartType".to_string(), Value::from(chart_type));
    chart.insert("title".to_string(), Value::from(title));
    chart.insert("description".to_string(), Value::from(description));
    chart.insert("spec".to_string(), spec);
    chart
}

/// Pick a chart from the shape of `rows`, or `None` if no rule applies.
pub fn auto_detect(question: &str, rows: &[Row]) -> Option<ChartSpec> {
    let first = rows.first()?;
    let columns: Vec<&String> = first.keys().collect();
    let roles = ColumnRoles::infer(rows);
    let row_count = rows.len();
    let title = title_for(question);

    if let Some(time_column) = roles.time_dimensions.first() {
        let value_column = roles
            .measures
            .first()
            .or_else(|| columns.iter().copied().find(|c| *c != time_column))
            .unwrap_or(time_column);
        return Some(chart(
            "line",
            title,
            format!("Trend analysis with {} data points", row_count),
            json!({"xField": time_column, "yField": value_column}),
        ));
    }

    let single_series = roles.measures.len() == 1 && roles.dimensions.len() == 1;

    if single_series && row_count <= 7 && contains_any(question, PIE_KEYWORDS) {
        return Some(chart(
            "pie",
            title,
            format!("Distribution across {} categories", row_count),
            json!({"angleField": roles.measures[0], "colorField": roles.dimensions[0]}),
        ));
    }

    if single_series && (2..=20).contains(&row_count) {
        return Some(chart(
            "bar",
            title,
            format!("Comparison across {} categories", row_count),
            json!({"xField": roles.dimensions[0], "yField": roles.measures[0]}),
        ));
    }

    if row_count > 50 || columns.len() > 5 {
        return Some(chart(
            "table",
            title,
            format!("Detailed data view with {} rows", row_count),
            json!({}),
        ));
    }

    None
}

/// Plain table used when neither rules nor the model produce a chart
pub fn fallback(rows: &[Row]) -> ChartSpec {
    chart(
        "table",
        "Query Results".to_string(),
        format!("Data table with {} rows", rows.len()),
        json!({}),
    )
}

/// Chart configuration as returned by the model
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelChart {
    pub chart_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub spec: serde_json::Map<String, Value>,
}

impl ModelChart {
    pub fn into_spec(self, question: &str) -> ChartSpec {
        chart(
            &self.chart_type.to_lowercase(),
            self.title.unwrap_or_else(|| title_for(question)),
            self.description.unwrap_or_default(),
            Value::Object(self.spec),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(values: Value) -> Vec<Row> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row.as_object().unwrap().clone())
            .collect()
    }

    fn products(count: usize) -> Vec<Row> {
        rows(Value::Array(
            (0..count)
                .map(|i| json!({"product_name": format!("P{i}"), "sales": i as f64 * 10.0}))
                .collect(),
        ))
    }

    #[test]
    fn test_time_series_is_line() {
        let data = rows(json!([
            {"month": "2024-01", "revenue": 10},
            {"month": "2024-02", "revenue": 12}
        ]));
        let chart = auto_detect("revenue by month", &data).unwrap();
        assert_eq!(chart["chartType"], "line");
        assert_eq!(chart["spec"]["xField"], "month");
        assert_eq!(chart["spec"]["yField"], "revenue");
    }

    #[test]
    fn test_date_values_detected_without_hint_in_name() {
        let data = rows(json!([
            {"bucket": "2024-01-01", "orders": 3},
            {"bucket": "2024-01-02", "orders": 5}
        ]));
        assert_eq!(auto_detect("orders", &data).unwrap()["chartType"], "line");
    }

    #[test]
    fn test_category_comparison_is_bar() {
        let chart = auto_detect("sales per product", &products(5)).unwrap();
        assert_eq!(chart["chartType"], "bar");
        assert_eq!(chart["spec"]["xField"], "product_name");
        assert_eq!(chart["spec"]["yField"], "sales");
    }

    #[test]
    fn test_share_question_is_pie() {
        let chart = auto_detect("sales share per product", &products(5)).unwrap();
        assert_eq!(chart["chartType"], "pie");
        assert_eq!(chart["spec"]["angleField"], "sales");

        let chart = auto_detect("各产品销售额占比", &products(4)).unwrap();
        assert_eq!(chart["chartType"], "pie");
    }

    #[test]
    fn test_too_many_slices_for_pie() {
        let chart = auto_detect("sales share per product", &products(12)).unwrap();
        assert_eq!(chart["chartType"], "bar");
    }

    #[test]
    fn test_large_result_is_table() {
        let chart = auto_detect("all products", &products(60)).unwrap();
        assert_eq!(chart["chartType"], "table");
    }

    #[test]
    fn test_unmatched_shape() {
        assert!(auto_detect("sales", &products(30)).is_none());
        assert!(auto_detect("sales", &[]).is_none());
    }

    #[test]
    fn test_needs_llm_for_analytical_questions() {
        assert!(needs_llm("Compare sales across regions"));
        assert!(needs_llm("分析一下销售趋势"));
        assert!(!needs_llm("top 5 products"));
    }

    #[test]
    fn test_title_truncation() {
        let long = "a".repeat(60);
        assert_eq!(title_for(&long), format!("{}...", "a".repeat(50)));
        assert_eq!(title_for(" short "), "short");
    }

    #[test]
    fn test_model_chart_into_spec() {
        let parsed: ModelChart = serde_json::from_value(json!({
            "chartType": "Scatter",
            "spec": {"xField": "price", "yField": "sales"}
        }))
        .unwrap();
        let spec = parsed.into_spec("price vs sales");
        assert_eq!(spec["chartType"], "scatter");
        assert_eq!(spec["title"], "price vs sales");
        assert_eq!(spec["spec"]["xField"], "price");
    }
}
