/// LLM client: the single point of entry for model serving calls.
///
/// No other module talks to the serving endpoint directly. Generation code holds an
/// `Arc<dyn CompletionStreamer>` so tests can script the token stream.
///
/// The serving endpoint speaks the OpenAI-compatible chat completions protocol:
/// `stream: true` answers with `data: {chunk}` frames and a final `data: [DONE]`.
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::stream::sse_events;

pub mod prompts;

const MAX_TOKENS: u32 = 2048;
const MAX_RETRIES: u32 = 3;
const DONE_SENTINEL: &str = "[DONE]";
const RETRY_BASE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Stream interrupted: {0}")]
    Stream(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Model text fragments in emission order.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Streaming chat completion. Implement this to swap the backend without touching
/// the generation pipeline.
///
/// Carried in `AppState` as `Arc<dyn CompletionStreamer>`.
#[async_trait]
pub trait CompletionStreamer: Send + Sync {
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<TokenStream, LlmError>;

    /// Endpoint or model name, for logs.
    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServingError {
    message: Option<String>,
    error: Option<ServingErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ServingErrorBody {
    message: String,
}

/// Client for a Databricks Model Serving endpoint.
#[derive(Clone)]
pub struct ServingClient {
    client: Client,
    host: String,
    token: String,
    model: String,
    retry_base: Duration,
}

/// Wait before retry number `attempt` (1-based): `base`, `2 * base`, `4 * base`, ...
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * (1 << (attempt - 1))
}

impl ServingClient {
    pub fn new(host: String, token: String, model: String) -> Result<Self, LlmError> {
        Ok(Self {
            // no overall timeout: a generation stream stays open as long as tokens flow
            client: Client::builder()
                .connect_timeout(Duration::from_secs(30))
                .build()?,
            host: host.trim_end_matches('/').to_string(),
            token,
            model,
            retry_base: RETRY_BASE,
        })
    }

    #[cfg(test)]
    fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    fn endpoint_url(&self) -> String {
        format!("{}/serving-endpoints/chat/completions", self.host)
    }

    /// Opens the streaming response. Retries on 429 (rate limit) and 5xx with
    /// exponential backoff. Nothing is retried once the body starts flowing.
    async fn open(&self, messages: &[ChatMessage]) -> Result<reqwest::Response, LlmError> {
        let request_body = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: MAX_TOKENS,
            stream: true,
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = backoff_delay(self.retry_base, attempt);
                warn!(
                    "Serving call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(self.endpoint_url())
                .bearer_auth(&self.token)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Serving endpoint returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: serving_error_message(body),
                });
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl CompletionStreamer for ServingClient {
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<TokenStream, LlmError> {
        let response = self.open(messages).await?;
        let body = response.bytes_stream();

        Ok(Box::pin(async_stream::try_stream! {
            let mut events = Box::pin(sse_events(body));
            let mut chunks = 0usize;

            while let Some(event) = events.next().await {
                let event = event.map_err(|e| LlmError::Stream(e.to_string()))?;
                if event.data.trim() == DONE_SENTINEL {
                    break;
                }
                chunks += 1;
                if let Some(text) = delta_text(&event.data)? {
                    yield text;
                }
            }

            debug!("Serving stream finished after {} chunks", chunks);
        }))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Extracts the content delta of one streamed chunk. Empty deltas are `None`.
fn delta_text(data: &str) -> Result<Option<String>, LlmError> {
    let chunk: ChatCompletionChunk = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|t| !t.is_empty()))
}

fn serving_error_message(body: String) -> String {
    match serde_json::from_str::<ServingError>(&body) {
        Ok(ServingError {
            error: Some(inner), ..
        }) => inner.message,
        Ok(ServingError {
            message: Some(message),
            ..
        }) => message,
        _ => body,
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, StatusCode},
        response::{IntoResponse, Response},
        routing::post,
        Router,
    };
    use bytes::Bytes;

    use super::*;

    const COMPLETIONS_PATH: &str = "/serving-endpoints/chat/completions";

    fn chunk(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": text}}]})
        )
    }

    fn event_stream(body: impl Into<Body>) -> Response {
        ([(header::CONTENT_TYPE, "text/event-stream")], body.into()).into_response()
    }

    /// Serves `upstream` on an ephemeral port and returns a client pointed at it.
    async fn serving_client(upstream: Router) -> ServingClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, upstream).await.unwrap();
        });
        ServingClient::new(format!("http://{addr}"), "token".into(), "test-model".into())
            .unwrap()
            .with_retry_base(Duration::from_millis(5))
    }

    /// Answers with `failures` copies of `status` before streaming `body`.
    fn flaky_upstream(status: StatusCode, failures: usize, body: String, calls: Arc<AtomicUsize>) -> Router {
        Router::new().route(
            COMPLETIONS_PATH,
            post(move || {
                let calls = Arc::clone(&calls);
                let body = body.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < failures {
                        (status, r#"{"error":{"message":"endpoint warming up"}}"#).into_response()
                    } else {
                        event_stream(body)
                    }
                }
            }),
        )
    }

    async fn tokens(client: &ServingClient) -> Vec<String> {
        client
            .stream_chat(&[ChatMessage::user("hi")])
            .await
            .unwrap()
            .map(|token| token.unwrap())
            .collect()
            .await
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_unclosed_fence() {
        let input = "```json\n{\"key\": \"va";
        assert_eq!(strip_json_fences(input), "{\"key\": \"va");
    }

    #[test]
    fn test_delta_text_extracts_content() {
        let data = r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Hel"}}]}"#;
        assert_eq!(delta_text(data).unwrap(), Some("Hel".to_string()));
    }

    #[test]
    fn test_delta_text_skips_role_only_and_empty_chunks() {
        let role_only = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        let empty = r#"{"choices":[{"index":0,"delta":{"content":""}}]}"#;
        let no_choices = r#"{"choices":[],"usage":{"prompt_tokens":10}}"#;
        assert_eq!(delta_text(role_only).unwrap(), None);
        assert_eq!(delta_text(empty).unwrap(), None);
        assert_eq!(delta_text(no_choices).unwrap(), None);
    }

    #[test]
    fn test_delta_text_rejects_malformed_chunk() {
        assert!(matches!(delta_text("{not json"), Err(LlmError::Parse(_))));
    }

    #[test]
    fn test_serving_error_message_prefers_nested_message() {
        let body = r#"{"error":{"message":"endpoint is scaling"}}"#.to_string();
        assert_eq!(serving_error_message(body), "endpoint is scaling");
        let flat = r#"{"error_code":"BAD_REQUEST","message":"bad model"}"#.to_string();
        assert_eq!(serving_error_message(flat), "bad model");
        assert_eq!(serving_error_message("plain".to_string()), "plain");
    }

    #[test]
    fn test_chat_message_wire_shape() {
        let json = serde_json::to_value(ChatMessage::system("be brief")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "system", "content": "be brief"}));
    }

    #[test]
    fn test_endpoint_url_trims_trailing_slash() {
        let client = ServingClient::new(
            "https://example.cloud.databricks.com/".into(),
            "t".into(),
            "m".into(),
        )
        .unwrap();
        assert_eq!(
            client.endpoint_url(),
            "https://example.cloud.databricks.com/serving-endpoints/chat/completions"
        );
    }

    #[test]
    fn test_backoff_doubles_from_base() {
        assert_eq!(backoff_delay(RETRY_BASE, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(RETRY_BASE, 2), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_last_chunk_without_separator_is_not_dropped() {
        let body = format!("{}{}", chunk("a"), chunk("b").trim_end());
        let client = serving_client(flaky_upstream(StatusCode::OK, 0, body, Arc::default())).await;

        assert_eq!(tokens(&client).await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_done_sentinel_ends_stream() {
        let body = format!("{}data: [DONE]\n\n{}", chunk("a"), chunk("late"));
        let client = serving_client(flaky_upstream(StatusCode::OK, 0, body, Arc::default())).await;

        assert_eq!(tokens(&client).await, vec!["a"]);
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_streams() {
        let calls = Arc::new(AtomicUsize::new(0));
        let upstream = flaky_upstream(
            StatusCode::SERVICE_UNAVAILABLE,
            2,
            format!("{}{}", chunk("Hi"), chunk(" Bob")),
            Arc::clone(&calls),
        );
        let client = serving_client(upstream).await;

        assert_eq!(tokens(&client).await, vec!["Hi", " Bob"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_three_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let upstream = flaky_upstream(StatusCode::TOO_MANY_REQUESTS, usize::MAX, String::new(), Arc::clone(&calls));
        let client = serving_client(upstream).await;

        let err = client.stream_chat(&[ChatMessage::user("hi")]).await.err().unwrap();
        assert!(matches!(err, LlmError::Api { status: 429, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_RETRIES as usize);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let upstream = flaky_upstream(StatusCode::BAD_REQUEST, usize::MAX, String::new(), Arc::clone(&calls));
        let client = serving_client(upstream).await;

        match client.stream_chat(&[ChatMessage::user("hi")]).await.err().unwrap() {
            LlmError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "endpoint warming up");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_broken_body_is_a_stream_error() {
        let first = chunk("a");
        let upstream = Router::new().route(
            COMPLETIONS_PATH,
            post(move || {
                let first = first.clone();
                async move {
                    let body = async_stream::stream! {
                        yield Ok::<_, std::io::Error>(Bytes::from(first));
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        yield Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"));
                    };
                    event_stream(Body::from_stream(body))
                }
            }),
        );
        let client = serving_client(upstream).await;

        let items: Vec<Result<String, LlmError>> = client
            .stream_chat(&[ChatMessage::user("hi")])
            .await
            .unwrap()
            .collect()
            .await;

        assert!(matches!(items.last(), Some(Err(LlmError::Stream(_)))));
        let ok: Vec<&String> = items.iter().filter_map(|item| item.as_ref().ok()).collect();
        assert!(ok.is_empty() || ok == vec!["a"]);
    }
}
