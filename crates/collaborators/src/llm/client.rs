use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::{Client, Response};
use tracing::{debug, error, info, warn};

use super::types::*;
use crate::error::{LlmError, LlmResult};

const DEFAULT_MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 60000;

/// Connection and sampling settings for an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl LlmConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: Some(0.0),
            max_tokens: None,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }
}

/// Client for chat-completions APIs (OpenAI, OpenRouter, DashScope, ...)
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn with_retry<T, F, Fut>(&self, operation: F, operation_name: &str) -> LlmResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = LlmResult<T>>,
    {
        let max_retries = self.config.max_retries;
        let max_backoff = Duration::from_millis(MAX_BACKOFF_MS);
        let mut retries = 0;
        let mut backoff = self.config.initial_backoff;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(LlmError::RateLimited { retry_after }) => {
                    if retries >= max_retries {
                        error!(
                            "{} failed after {} retries due to rate limiting",
                            operation_name, retries
                        );
                        return Err(LlmError::RateLimited { retry_after });
                    }

                    let wait = retry_after
                        .map(Duration::from_secs)
                        .unwrap_or(backoff)
                        .min(max_backoff);

                    warn!(
                        "{} rate limited, retrying in {:?} (attempt {}/{})",
                        operation_name,
                        wait,
                        retries + 1,
                        max_retries
                    );

                    tokio::time::sleep(wait).await;
                    retries += 1;
                    backoff = (backoff * 2).min(max_backoff);
                }
                Err(LlmError::Api {
                    ref message,
                    status_code: Some(code),
                }) if code >= 500 => {
                    if retries >= max_retries {
                        error!(
                            "{} failed after {} retries due to server error: {}",
                            operation_name, retries, message
                        );
                        return Err(LlmError::Api {
                            message: message.clone(),
                            status_code: Some(code),
                        });
                    }

                    warn!(
                        "{} server error ({}), retrying in {:?} (attempt {}/{})",
                        operation_name,
                        code,
                        backoff,
                        retries + 1,
                        max_retries
                    );

                    tokio::time::sleep(backoff).await;
                    retries += 1;
                    backoff = (backoff * 2).min(max_backoff);
                }
                Err(e) => {
                    if retries > 0 {
                        info!("{} failed after {} retries: {}", operation_name, retries, e);
                    }
                    return Err(e);
                }
            }
        }
    }

    fn request(&self, messages: Vec<ChatMessage>, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: Some(stream),
        }
    }

    async fn send(&self, request: &ChatCompletionRequest) -> LlmResult<Response> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    /// Single-shot completion, retried on 429 and 5xx responses
    pub async fn chat_completion(&self, messages: Vec<ChatMessage>) -> LlmResult<String> {
        self.with_retry(
            || async { self.chat_completion_inner(messages.clone()).await },
            "chat_completion",
        )
        .await
    }

    async fn chat_completion_inner(&self, messages: Vec<ChatMessage>) -> LlmResult<String> {
        debug!(
            "Creating chat completion with {} messages, model {}",
            messages.len(),
            self.config.model
        );

        let request = self.request(messages, false);
        let response = self.send(&request).await?;
        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    /// Create a streaming chat completion
    ///
    /// Only the initial request is retried; once bytes flow, errors are
    /// surfaced as stream items.
    pub async fn chat_completion_stream(
        &self,
        messages: Vec<ChatMessage>,
    ) -> LlmResult<BoxStream<'static, LlmResult<String>>> {
        use eventsource_stream::Eventsource;

        debug!(
            "Creating streaming chat completion with {} messages, model {}",
            messages.len(),
            self.config.model
        );

        let request = self.request(messages, true);
        let response = self
            .with_retry(|| self.send(&request), "chat_completion_stream")
            .await?;

        let byte_stream = response
            .bytes_stream()
            .map(|r| r.map_err(std::io::Error::other));

        let content_stream = byte_stream
            .eventsource()
            .take_while(|event| {
                let done = matches!(event, Ok(event) if event.data.trim() == "[DONE]");
                futures::future::ready(!done)
            })
            .filter_map(|event_result| async move {
                match event_result {
                    Ok(event) => match serde_json::from_str::<ChatCompletionChunk>(&event.data) {
                        Ok(chunk) => chunk
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|choice| choice.delta.content)
                            .filter(|content| !content.is_empty())
                            .map(Ok),
                        Err(e) => {
                            warn!("Failed to parse SSE chunk: {}", e);
                            None
                        }
                    },
                    Err(e) => Some(Err(LlmError::Api {
                        message: format!("SSE error: {}", e),
                        status_code: None,
                    })),
                }
            });

        Ok(content_stream.boxed())
    }
}

async fn error_from_response(response: Response) -> LlmError {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        warn!("Rate limited by LLM endpoint");
        return LlmError::RateLimited { retry_after };
    }

    let error_text = response.text().await.unwrap_or_default();

    if let Ok(body) = serde_json::from_str::<ApiErrorBody>(&error_text) {
        error!(
            "LLM API error: {} (type: {:?})",
            body.error.message, body.error.error_type
        );
        return LlmError::Api {
            message: body.error.message,
            status_code: Some(status),
        };
    }

    LlmError::Api {
        message: error_text,
        status_code: Some(status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> LlmClient {
        LlmClient::new(
            LlmConfig::new(server.uri(), "test-key", "test-model")
                .with_initial_backoff(Duration::from_millis(1)),
        )
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "choices": [{
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
    }

    #[tokio::test]
    async fn test_chat_completion_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "test-model", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("hello")))
            .expect(1)
            .mount(&server)
            .await;

        let content = client_for(&server)
            .chat_completion(vec![ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("recovered")))
            .mount(&server)
            .await;

        let content = client_for(&server)
            .chat_completion(vec![ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(content, "recovered");
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "invalid api key", "type": "auth"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let error = client_for(&server)
            .chat_completion(vec![ChatMessage::user("hi")])
            .await
            .unwrap_err();
        match error {
            LlmError::Api {
                message,
                status_code,
            } => {
                assert_eq!(message, "invalid api key");
                assert_eq!(status_code, Some(401));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount(&server)
            .await;

        let client = LlmClient::new(
            LlmConfig::new(server.uri(), "k", "m")
                .with_max_retries(1)
                .with_initial_backoff(Duration::from_millis(1)),
        );
        let error = client
            .chat_completion(vec![ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(error, LlmError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_blank_completion_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("  ")))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .chat_completion(vec![ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(error, LlmError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_stream_yields_deltas_until_done() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Laptop \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"leads sales.\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let stream = client_for(&server)
            .chat_completion_stream(vec![ChatMessage::user("summarize")])
            .await
            .unwrap();
        let chunks: Vec<String> = stream.map(|chunk| chunk.unwrap()).collect().await;
        assert_eq!(chunks, vec!["Laptop ", "leads sales."]);
    }
}
