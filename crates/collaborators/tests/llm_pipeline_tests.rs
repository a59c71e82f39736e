//! End-to-end runs of the orchestrator with LLM-backed agents against a
//! mocked chat-completions endpoint.

use std::sync::Arc;
use std::time::Duration;

use chatbi_core::{SessionOutcome, StepName, TableSchema};
use collaborators::{DemoQueryExecutor, LlmAgents, LlmClient, LlmConfig};
use events::Event;
use orchestrator::{CollaboratorRegistry, Orchestrator, OrchestratorConfig, SessionConfig};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
}

async fn mount_reply(server: &MockServer, prompt_marker: &str, content: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(prompt_marker))
        .respond_with(completion(content))
        .mount(server)
        .await;
}

fn orchestrator_for(server: &MockServer) -> Orchestrator {
    let client = LlmClient::new(
        LlmConfig::new(server.uri(), "test-key", "test-model")
            .with_max_retries(0)
            .with_initial_backoff(Duration::from_millis(1)),
    );
    let registry = CollaboratorRegistry::from_agents(
        Arc::new(LlmAgents::new(client)),
        Arc::new(DemoQueryExecutor),
    );
    let catalog = vec![TableSchema::new("products")
        .with_column("product_name", "TEXT")
        .with_column("sales", "REAL")];

    Orchestrator::new(OrchestratorConfig::default(), registry)
        .unwrap()
        .with_catalog(Arc::new(catalog))
}

#[tokio::test]
async fn test_demo_question_runs_every_step() {
    let server = MockServer::start().await;
    mount_reply(
        &server,
        "You classify questions",
        r#"{"intent": "query", "confidence": 0.95, "reasoning": "asks for a ranking"}"#,
    )
    .await;
    mount_reply(&server, "You select the database tables", r#"{"tables": ["products"]}"#).await;
    mount_reply(
        &server,
        "You write SQL",
        "```sql\nSELECT product_name, sales FROM products ORDER BY sales DESC LIMIT 5\n```",
    )
    .await;
    mount_reply(
        &server,
        "You are a data analyst",
        r#"{"summary": "Laptops lead sales.", "key_points": ["Laptop: 1500"], "confidence": 0.9}"#,
    )
    .await;
    Mock::given(method("POST"))
        .and(body_string_contains("\"stream\":true"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(concat!(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"Laptop is \"}}]}\n\n",
                    "data: {\"choices\":[{\"delta\":{\"content\":\"the top seller.\"}}]}\n\n",
                    "data: [DONE]\n\n",
                )),
        )
        .mount(&server)
        .await;

    let orchestrator = orchestrator_for(&server);
    let run = orchestrator
        .run(
            "top 5 products by revenue",
            SessionConfig::new().with_language("en-US"),
        )
        .unwrap();
    let (events, result) = run.collect().await;
    let state = result.unwrap();

    let steps: Vec<StepName> = events.iter().filter_map(|e| e.event.step()).collect();
    assert_eq!(
        steps,
        vec![
            StepName::Intent,
            StepName::Schema,
            StepName::Query,
            StepName::Execute,
            StepName::Chart,
            StepName::Diagnosis,
            StepName::Answer,
        ]
    );

    let chunks: Vec<&str> = events
        .iter()
        .filter_map(|e| match &e.event {
            Event::AnswerChunk { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(chunks, vec!["Laptop is ", "the top seller."]);

    assert_eq!(state.outcome(), Some(SessionOutcome::Completed));
    assert_eq!(state.answer(), Some("Laptop is the top seller."));
    assert_eq!(
        state.generated_query(),
        Some("SELECT product_name, sales FROM products ORDER BY sales DESC LIMIT 5")
    );
    assert_eq!(state.result_rows().map(|rows| rows.len()), Some(5));
    let chart = state.chart_spec().unwrap();
    assert_eq!(chart["chartType"], "bar");
    assert_eq!(state.retry_count(), 0);
}

#[tokio::test]
async fn test_greeting_ends_after_intent() {
    let server = MockServer::start().await;
    mount_reply(
        &server,
        "You classify questions",
        r#"{"intent": "greeting", "confidence": 0.99}"#,
    )
    .await;

    let run = orchestrator_for(&server)
        .run("你好", SessionConfig::new())
        .unwrap();
    let (events, result) = run.collect().await;
    let state = result.unwrap();

    let steps: Vec<StepName> = events.iter().filter_map(|e| e.event.step()).collect();
    assert_eq!(steps, vec![StepName::Intent]);
    assert_eq!(state.outcome(), Some(SessionOutcome::EndedEarly));
    assert!(state.answer().is_none());
    assert!(state.error().is_none());
}

#[tokio::test]
async fn test_unreachable_model_fails_the_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let run = orchestrator_for(&server)
        .run("top products", SessionConfig::new())
        .unwrap();
    let (events, result) = run.collect().await;
    let state = result.unwrap();

    assert_eq!(state.outcome(), Some(SessionOutcome::Failed));
    assert!(state.error().is_some());
    assert!(matches!(
        events.last().map(|e| &e.event),
        Some(Event::SessionFinished {
            outcome: SessionOutcome::Failed,
            ..
        })
    ));
}
