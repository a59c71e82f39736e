//! Lenient extraction of structured payloads from model output.

use serde::de::DeserializeOwned;

use crate::error::{LlmError, LlmResult};

/// Parse the JSON object embedded in `text`.
///
/// Models routinely wrap JSON in code fences or add a sentence before it,
/// so everything outside the outermost braces is ignored.
pub fn extract_json<T: DeserializeOwned>(text: &str) -> LlmResult<T> {
    let body = strip_fence(text, "json").unwrap_or(text);
    let start = body.find('{');
    let end = body.rfind('}');
    let candidate = match (start, end) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => return Err(LlmError::Parse(format!("no JSON object in: {}", preview(text)))),
    };
    serde_json::from_str(candidate)
        .map_err(|e| LlmError::Parse(format!("{}: {}", e, preview(candidate))))
}

/// Pull the SQL statement out of a completion.
///
/// Tries a ```sql fence, then any fence, then the first `SELECT`/`WITH`
/// onwards, and finally the trimmed text. Trailing semicolons are dropped.
pub fn extract_sql(text: &str) -> String {
    let sql = strip_fence(text, "sql")
        .or_else(|| strip_fence(text, ""))
        .or_else(|| statement_start(text).map(|start| &text[start..]))
        .unwrap_or(text);
    sql.trim().trim_end_matches(';').trim().to_string()
}

fn strip_fence<'a>(text: &'a str, lang: &str) -> Option<&'a str> {
    let open = format!("```{}", lang);
    let start = text.find(&open)? + open.len();
    let rest = &text[start..];
    // Skip the remainder of the opening line, e.g. a language tag.
    let body_start = rest.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

fn statement_start(text: &str) -> Option<usize> {
    let upper = text.to_ascii_uppercase();
    ["SELECT", "WITH"]
        .iter()
        .filter_map(|keyword| {
            upper.match_indices(keyword).map(|(i, _)| i).find(|&i| {
                let before = upper[..i].chars().next_back();
                let after = upper[i + keyword.len()..].chars().next();
                !before.is_some_and(|c| c.is_alphanumeric() || c == '_')
                    && after.is_some_and(char::is_whitespace)
            })
        })
        .min()
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > 80 {
        format!("{}...", trimmed.chars().take(80).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Tables {
        tables: Vec<String>,
    }

    #[test]
    fn test_extract_json_from_fence() {
        let text = "Here you go:\n```json\n{\"tables\": [\"orders\"]}\n```";
        let parsed: Tables = extract_json(text).unwrap();
        assert_eq!(parsed.tables, vec!["orders"]);
    }

    #[test]
    fn test_extract_json_with_surrounding_prose() {
        let text = "Selected {\"tables\": [\"orders\", \"customers\"]} based on the question.";
        let parsed: Tables = extract_json(text).unwrap();
        assert_eq!(parsed.tables.len(), 2);
    }

    #[test]
    fn test_extract_json_without_object() {
        let error = extract_json::<Tables>("I cannot answer that").unwrap_err();
        assert!(matches!(error, LlmError::Parse(_)));
    }

    #[test]
    fn test_extract_sql_prefers_sql_fence() {
        let text = "The query:\n```sql\nSELECT product_name, SUM(sales) FROM orders GROUP BY 1;\n```\nDone.";
        assert_eq!(
            extract_sql(text),
            "SELECT product_name, SUM(sales) FROM orders GROUP BY 1"
        );
    }

    #[test]
    fn test_extract_sql_from_prose() {
        let text = "Sure! select name from products where price > 10";
        assert_eq!(extract_sql(text), "select name from products where price > 10");
    }

    #[test]
    fn test_extract_sql_ignores_keywords_inside_words() {
        let text = "Answer without joins: SELECT COUNT(*) FROM orders";
        assert_eq!(extract_sql(text), "SELECT COUNT(*) FROM orders");
    }

    #[test]
    fn test_extract_sql_plain_text() {
        assert_eq!(extract_sql("  SELECT 1;  "), "SELECT 1");
    }
}
