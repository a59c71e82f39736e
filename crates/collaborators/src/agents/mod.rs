//! LLM-backed implementations of the text-generation collaborators.

pub mod chart;
mod parse;
mod prompts;

use async_trait::async_trait;
use chatbi_core::{ChartSpec, InsightSummary, Row, TableSchema};
use futures::StreamExt;
use orchestrator::collaborators::{
    AmbiguityAssessment, AmbiguityChecker, AnswerRequest, AnswerStream, AnswerSynthesizer,
    ChartAdvisor, CollaboratorResult, DiagnosisGenerator, DiagnosisRequest,
    IntentClassification, IntentClassifier, QueryGenerator, QueryReasoner, QueryRequest,
    SchemaSelector,
};
use orchestrator::CollaboratorError;
use serde::Deserialize;
use tracing::{debug, info, warn};

pub use parse::{extract_json, extract_sql};
pub use prompts::AgentPrompts;

use crate::llm::LlmClient;

/// Rows shown to the model when it picks a chart
const CHART_SAMPLE_ROWS: usize = 5;

#[derive(Debug, Deserialize)]
struct TableSelection {
    #[serde(default)]
    tables: Vec<String>,
}

/// Every text-generation collaborator, sharing one [`LlmClient`]
#[derive(Clone)]
pub struct LlmAgents {
    client: LlmClient,
}

impl LlmAgents {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &LlmClient {
        &self.client
    }
}

#[async_trait]
impl IntentClassifier for LlmAgents {
    async fn classify(&self, question: &str) -> CollaboratorResult<IntentClassification> {
        let response = self
            .client
            .chat_completion(AgentPrompts::intent(question))
            .await?;
        let mut classification: IntentClassification = extract_json(&response)?;
        classification.confidence = classification.confidence.clamp(0.0, 1.0);
        debug!(
            intent = %classification.intent.as_str(),
            confidence = classification.confidence,
            "Intent classified"
        );
        Ok(classification)
    }
}

#[async_trait]
impl AmbiguityChecker for LlmAgents {
    async fn check(&self, question: &str) -> CollaboratorResult<AmbiguityAssessment> {
        let response = self
            .client
            .chat_completion(AgentPrompts::ambiguity(question))
            .await?;
        Ok(extract_json(&response)?)
    }
}

#[async_trait]
impl SchemaSelector for LlmAgents {
    async fn select(
        &self,
        question: &str,
        candidates: &[TableSchema],
    ) -> CollaboratorResult<Vec<TableSchema>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .chat_completion(AgentPrompts::schema_selection(question, candidates))
            .await?;
        let selection: TableSelection = extract_json(&response)?;

        // Names the model got wrong are passed through bare so the caller
        // can report them.
        let selected = selection
            .tables
            .iter()
            .map(|name| {
                candidates
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
                    .cloned()
                    .unwrap_or_else(|| TableSchema::new(name.trim()))
            })
            .collect();
        Ok(selected)
    }
}

#[async_trait]
impl QueryReasoner for LlmAgents {
    async fn reason(&self, question: &str, schemas: &[TableSchema]) -> CollaboratorResult<String> {
        let response = self
            .client
            .chat_completion(AgentPrompts::reasoning(question, schemas))
            .await?;
        Ok(response.trim().to_string())
    }
}

#[async_trait]
impl QueryGenerator for LlmAgents {
    async fn generate(&self, request: &QueryRequest<'_>) -> CollaboratorResult<String> {
        let messages = AgentPrompts::query(
            request.question,
            request.schemas,
            request.reasoning,
            request.correction,
        );
        let response = self.client.chat_completion(messages).await?;
        let sql = extract_sql(&response);
        if sql.is_empty() {
            return Err(CollaboratorError::Invocation(
                "model returned no SQL".to_string(),
            ));
        }
        Ok(sql)
    }
}

#[async_trait]
impl ChartAdvisor for LlmAgents {
    async fn advise(&self, question: &str, rows: &[Row]) -> CollaboratorResult<ChartSpec> {
        let detected = chart::auto_detect(question, rows);
        if let Some(spec) = &detected {
            if !chart::needs_llm(question) {
                info!(chart_type = ?spec.get("chartType"), "Auto-detected chart type");
                return Ok(spec.clone());
            }
        }

        let columns: Vec<String> = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        let sample = &rows[..rows.len().min(CHART_SAMPLE_ROWS)];

        let suggested = match self
            .client
            .chat_completion(AgentPrompts::chart(question, &columns, sample))
            .await
        {
            Ok(response) => extract_json::<chart::ModelChart>(&response),
            Err(error) => Err(error),
        };

        match suggested {
            Ok(model_chart) => Ok(model_chart.into_spec(question)),
            Err(error) => {
                warn!(error = %error, "Chart suggestion failed, using fallback");
                Ok(detected.unwrap_or_else(|| chart::fallback(rows)))
            }
        }
    }
}

#[async_trait]
impl DiagnosisGenerator for LlmAgents {
    async fn diagnose(&self, request: &DiagnosisRequest<'_>) -> CollaboratorResult<InsightSummary> {
        let messages = AgentPrompts::diagnosis(
            request.question,
            request.query,
            request.rows,
            request.language,
        );
        let response = self.client.chat_completion(messages).await?;
        let mut insight: InsightSummary = extract_json(&response)?;
        insight.confidence = insight.confidence.clamp(0.0, 1.0);
        Ok(insight)
    }
}

#[async_trait]
impl AnswerSynthesizer for LlmAgents {
    async fn synthesize(&self, request: &AnswerRequest<'_>) -> CollaboratorResult<AnswerStream> {
        let messages = AgentPrompts::answer(
            request.question,
            request.rows,
            request.chart_spec,
            request.diagnosis,
            request.language,
        );
        let stream = self.client.chat_completion_stream(messages).await?;
        Ok(stream
            .map(|chunk| chunk.map_err(CollaboratorError::from))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use chatbi_core::Intent;
    use orchestrator::Correction;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::llm::LlmConfig;

    fn agents_for(server: &MockServer) -> LlmAgents {
        LlmAgents::new(LlmClient::new(
            LlmConfig::new(server.uri(), "k", "m")
                .with_max_retries(0)
                .with_initial_backoff(Duration::from_millis(1)),
        ))
    }

    async fn reply_with(server: &MockServer, content: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": content}}]
            })))
            .mount(server)
            .await;
    }

    fn catalog() -> Vec<TableSchema> {
        vec![
            TableSchema::new("orders").with_column("sales", "REAL"),
            TableSchema::new("customers").with_column("name", "TEXT"),
        ]
    }

    #[tokio::test]
    async fn test_classify_parses_fenced_json() {
        let server = MockServer::start().await;
        reply_with(
            &server,
            "```json\n{\"intent\": \"query\", \"confidence\": 1.4, \"reasoning\": \"asks for data\"}\n```",
        )
        .await;

        let result = agents_for(&server).classify("top products").await.unwrap();
        assert_eq!(result.intent, Intent::Query);
        assert_eq!(result.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_unparseable_output_is_invocation_error() {
        let server = MockServer::start().await;
        reply_with(&server, "I think this is a query").await;

        let error = agents_for(&server).classify("top products").await.unwrap_err();
        assert!(matches!(error, CollaboratorError::Invocation(_)));
    }

    #[tokio::test]
    async fn test_select_resolves_names_case_insensitively() {
        let server = MockServer::start().await;
        reply_with(&server, r#"{"tables": ["ORDERS", "invoices"]}"#).await;

        let selected = agents_for(&server)
            .select("sales by customer", &catalog())
            .await
            .unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].name, "orders");
        assert_eq!(selected[0].columns.len(), 1);
        assert_eq!(selected[1].name, "invoices");
        assert!(selected[1].columns.is_empty());
    }

    #[tokio::test]
    async fn test_generate_sends_correction_and_extracts_sql() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("no such column: qty"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant",
                    "content": "```sql\nSELECT SUM(sales) FROM orders;\n```"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let schemas = catalog();
        let correction = Correction {
            prior_query: Some("SELECT SUM(qty) FROM orders".to_string()),
            prior_error: "no such column: qty".to_string(),
            attempt: 2,
        };
        let request = QueryRequest {
            question: "total sales",
            schemas: &schemas,
            reasoning: None,
            correction: Some(&correction),
        };
        let sql = agents_for(&server).generate(&request).await.unwrap();
        assert_eq!(sql, "SELECT SUM(sales) FROM orders");
    }

    #[tokio::test]
    async fn test_simple_chart_skips_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let rows: Vec<Row> = (0..3)
            .map(|i| {
                json!({"product_name": format!("P{i}"), "sales": i})
                    .as_object()
                    .unwrap()
                    .clone()
            })
            .collect();
        let spec = agents_for(&server)
            .advise("sales per product", &rows)
            .await
            .unwrap();
        assert_eq!(spec["chartType"], "bar");
    }

    #[tokio::test]
    async fn test_chart_falls_back_when_model_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;

        let rows: Vec<Row> = (0..30)
            .map(|i| json!({"a": i, "b": i}).as_object().unwrap().clone())
            .collect();
        let spec = agents_for(&server)
            .advise("analyze the relationship between a and b", &rows)
            .await
            .unwrap();
        assert_eq!(spec["chartType"], "table");
        assert_eq!(spec["title"], "Query Results");
    }

    #[tokio::test]
    async fn test_diagnose_parses_insight() {
        let server = MockServer::start().await;
        reply_with(
            &server,
            r#"{"summary": "Laptops dominate revenue.", "key_points": ["Laptop 1500"], "confidence": 0.8}"#,
        )
        .await;

        let request = DiagnosisRequest {
            question: "sales",
            query: "SELECT 1",
            rows: &[],
            language: "en-US",
        };
        let insight = agents_for(&server).diagnose(&request).await.unwrap();
        assert_eq!(insight.summary, "Laptops dominate revenue.");
        assert_eq!(insight.key_points.len(), 1);
    }

    #[tokio::test]
    async fn test_synthesize_streams_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("\"stream\":true"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(concat!(
                        "data: {\"choices\":[{\"delta\":{\"content\":\"笔记本\"}}]}\n\n",
                        "data: {\"choices\":[{\"delta\":{\"content\":\"销量最高\"}}]}\n\n",
                        "data: [DONE]\n\n",
                    )),
            )
            .mount(&server)
            .await;

        let request = AnswerRequest {
            question: "哪个产品卖得最好",
            rows: &[],
            chart_spec: None,
            diagnosis: None,
            language: "zh-CN",
        };
        let stream = agents_for(&server).synthesize(&request).await.unwrap();
        let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks.concat(), "笔记本销量最高");
    }
}
