use chatbi_core::{ChartSpec, InsightSummary, Row, TableSchema};
use orchestrator::Correction;

use crate::llm::ChatMessage;

/// Rows included verbatim in answer prompts
const ANSWER_SAMPLE_ROWS: usize = 10;

pub struct AgentPrompts;

impl AgentPrompts {
    pub fn intent(question: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(
                r#"You classify questions sent to a Business Intelligence assistant.

## Intents
- query: the user wants data, metrics, rankings or trends from the database
- greeting: hello, thanks, small talk
- help: questions about what the assistant can do or how to use it
- clarification: the user is answering or refining an earlier question
- unknown: anything else

## Output
Respond with a single JSON object and nothing else:
{"intent": "<one of the intents>", "confidence": <0.0-1.0>, "reasoning": "<one sentence>"}"#,
            ),
            ChatMessage::user(format!("Question: {}", question)),
        ]
    }

    pub fn ambiguity(question: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(
                r#"You decide whether a data question is too ambiguous to turn into SQL.

## Ambiguity types
- completely_vague: no metric or subject can be identified ("show me the data")
- multiple_interpretations: several reasonable readings lead to different queries
- missing_critical_context: a required filter such as the time range is missing and cannot be defaulted
- none: the question can be answered as asked

Only flag a question when guessing would likely produce a wrong answer.

## Output
Respond with a single JSON object and nothing else:
{"is_ambiguous": <bool>, "ambiguity_type": "<type>", "clarification_question": "<question or null>",
 "options": [{"label": "<short option>", "description": "<what it means>"}]}"#,
            ),
            ChatMessage::user(format!("Question: {}", question)),
        ]
    }

    pub fn schema_selection(question: &str, candidates: &[TableSchema]) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(
                r#"You select the database tables needed to answer a question.

Pick the minimum set of tables. Include join tables only when the answer needs them.
Use table names exactly as given.

## Output
Respond with a single JSON object and nothing else:
{"tables": ["<table name>", ...]}"#,
            ),
            ChatMessage::user(format!(
                "Question: {}\n\n## Available tables\n{}",
                question,
                render_schemas(candidates)
            )),
        ]
    }

    pub fn reasoning(question: &str, schemas: &[TableSchema]) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(
                r#"You are a Business Intelligence query planner.

Before any SQL is written, explain how the question maps onto the schema:
1. The metrics to compute and their aggregation
2. The dimensions to group by
3. Filters, including time ranges
4. Joins and their keys
5. Ordering and limits

Be concise. Do not write the final SQL."#,
            ),
            ChatMessage::user(format!(
                "Question: {}\n\n## Schema\n{}",
                question,
                render_schemas(schemas)
            )),
        ]
    }

    pub fn query(
        question: &str,
        schemas: &[TableSchema],
        reasoning: Option<&str>,
        correction: Option<&Correction>,
    ) -> Vec<ChatMessage> {
        let mut prompt = format!(
            "Question: {}\n\n## Schema\n{}",
            question,
            render_schemas(schemas)
        );

        if let Some(reasoning) = reasoning {
            prompt.push_str(&format!("\n\n## Query plan\n{}", reasoning));
        }

        if let Some(correction) = correction {
            prompt.push_str(&format!(
                "\n\n## Previous attempt failed (attempt {})\n",
                correction.attempt
            ));
            if let Some(query) = &correction.prior_query {
                prompt.push_str(&format!("```sql\n{}\n```\n", query));
            }
            prompt.push_str(&format!(
                "Error: {}\n\nFix the problem and return a corrected query.",
                correction.prior_error
            ));
        }

        vec![
            ChatMessage::system(
                r#"You write SQL for a Business Intelligence assistant.

## Rules
1. Write a single read-only SELECT statement (CTEs are allowed)
2. Use only the tables and columns in the schema
3. Alias aggregated columns with readable snake_case names
4. Add LIMIT 1000 unless the question asks for everything

Return only the SQL inside a ```sql code block."#,
            ),
            ChatMessage::user(prompt),
        ]
    }

    pub fn chart(question: &str, columns: &[String], sample: &[Row]) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(
                r#"You choose a chart for query results.

## Chart types
line, bar, pie, scatter, table

## Output
Respond with a single JSON object and nothing else:
{"chartType": "<type>", "title": "<short title>", "description": "<one sentence>",
 "spec": {"xField": "<column>", "yField": "<column>"}}

Pie charts use {"angleField": "<measure>", "colorField": "<category>"} as spec;
tables use an empty spec."#,
            ),
            ChatMessage::user(format!(
                "Question: {}\nColumns: {}\nSample rows:\n{}",
                question,
                columns.join(", "),
                render_rows(sample)
            )),
        ]
    }

    pub fn diagnosis(question: &str, query: &str, rows: &[Row], language: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(format!(
                r#"You are a data analyst. Analyze the data returned for a question.

1. Summarize what the data shows in 2-3 sentences
2. List 3-5 key trends, anomalies or notable facts
3. Focus on business meaning, not on restating numbers
4. Assume the SQL is correct
5. Write in {}

## Output
Respond with a single JSON object and nothing else:
{{"summary": "<summary>", "key_points": ["<point>", ...], "confidence": <0.0-1.0>}}"#,
                language_name(language)
            )),
            ChatMessage::user(format!(
                "Question: {}\nSQL: {}\n\n## Data sample\n{}\n\nRows in sample: {}",
                question,
                query,
                render_rows(rows),
                rows.len()
            )),
        ]
    }

    pub fn answer(
        question: &str,
        rows: &[Row],
        chart_spec: Option<&ChartSpec>,
        diagnosis: Option<&InsightSummary>,
        language: &str,
    ) -> Vec<ChatMessage> {
        let system = if is_chinese(language) {
            "你是一个商业智能助手。根据查询结果，用简洁、准确的中文回答用户的问题。\
             先给出直接结论，再补充关键数据。不要编造数据中不存在的信息。"
        } else {
            "You are a Business Intelligence assistant. Answer the user's question from the \
             query results in clear, concise English. Lead with the direct answer, then the \
             supporting figures. Never invent numbers that are not in the data."
        };

        let mut context = format!(
            "Question: {}\n\n## Results ({} rows)\n{}",
            question,
            rows.len(),
            render_rows(&rows[..rows.len().min(ANSWER_SAMPLE_ROWS)])
        );
        if let Some(diagnosis) = diagnosis {
            context.push_str(&format!("\n\n## Analysis\n{}", diagnosis.summary));
            for point in &diagnosis.key_points {
                context.push_str(&format!("\n- {}", point));
            }
        }
        if let Some(chart_type) = chart_spec
            .and_then(|spec| spec.get("chartType"))
            .and_then(|value| value.as_str())
        {
            context.push_str(&format!(
                "\n\nThe results are shown to the user as a {} chart.",
                chart_type
            ));
        }

        vec![ChatMessage::system(system), ChatMessage::user(context)]
    }
}

pub fn is_chinese(language: &str) -> bool {
    language.to_ascii_lowercase().starts_with("zh")
}

fn language_name(language: &str) -> &'static str {
    if is_chinese(language) {
        "Simplified Chinese"
    } else {
        "English"
    }
}

fn render_schemas(schemas: &[TableSchema]) -> String {
    schemas
        .iter()
        .map(TableSchema::to_ddl)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_rows(rows: &[Row]) -> String {
    serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string())
}
