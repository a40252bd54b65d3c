//! Test doubles shared by unit tests across modules.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::config::Config;
use crate::feedback::{FeedbackSink, FeedbackSubmission};
use crate::generation::producer::EmailGenerator;
use crate::generation::retrieval::CustomerStore;
use crate::llm_client::{ChatMessage, CompletionStreamer, LlmError, TokenStream};
use crate::state::AppState;

pub fn sample_customers() -> CustomerStore {
    CustomerStore::new(vec![
        json!({
            "account": {"name": "Acme Corp", "industry": "Retail", "tier": "Enterprise"},
            "recent_activity": {"meetings": [{"date": "2024-05-02", "topic": "Renewal"}]},
            "sales_rep": {"name": "Sam Rivera"}
        }),
        json!({
            "account": {"name": "Beacon Health", "industry": "Healthcare"},
            "sales_rep": {"name": "Dana Lee"}
        }),
    ])
}

enum Script {
    Tokens(Vec<String>),
    FailAfter(Vec<String>, String),
    Unavailable(String),
}

/// Replays a fixed token script and records every message list it was called with.
pub struct ScriptedStreamer {
    script: Script,
    calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedStreamer {
    fn with(script: Script) -> Self {
        Self {
            script,
            calls: Arc::default(),
        }
    }

    pub fn tokens(tokens: &[&str]) -> Self {
        Self::with(Script::Tokens(tokens.iter().map(|t| t.to_string()).collect()))
    }

    pub fn failing_after(tokens: &[&str], error: &str) -> Self {
        Self::with(Script::FailAfter(
            tokens.iter().map(|t| t.to_string()).collect(),
            error.to_string(),
        ))
    }

    pub fn unavailable(message: &str) -> Self {
        Self::with(Script::Unavailable(message.to_string()))
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<Vec<ChatMessage>>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl CompletionStreamer for ScriptedStreamer {
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<TokenStream, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());

        let items: Vec<Result<String, LlmError>> = match &self.script {
            Script::Tokens(tokens) => tokens.iter().cloned().map(Ok).collect(),
            Script::FailAfter(tokens, error) => tokens
                .iter()
                .cloned()
                .map(Ok)
                .chain(std::iter::once(Err(LlmError::Stream(error.clone()))))
                .collect(),
            Script::Unavailable(message) => {
                return Err(LlmError::Api {
                    status: 503,
                    message: message.clone(),
                })
            }
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Records submissions; optionally fails every one of them.
#[derive(Default)]
pub struct RecordingSink {
    pub submissions: Mutex<Vec<FeedbackSubmission>>,
    pub fail_with: Option<String>,
}

#[async_trait]
impl FeedbackSink for RecordingSink {
    async fn log_feedback(&self, submission: &FeedbackSubmission) -> anyhow::Result<()> {
        self.submissions.lock().unwrap().push(submission.clone());
        match &self.fail_with {
            Some(message) => Err(anyhow::anyhow!(message.clone())),
            None => Ok(()),
        }
    }
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| {
        let value = match key {
            "DATABRICKS_HOST" => "adb-123.azuredatabricks.net",
            "DATABRICKS_TOKEN" => "dapi-test",
            "LLM_MODEL" => "scripted",
            "MLFLOW_EXPERIMENT_ID" => "42",
            "PROMPT_VARIANT" => "fixed",
            "CLIENT_BUILD_DIR" => "/nonexistent/client/build",
            _ => return None,
        };
        Some(value.to_string())
    })
    .unwrap()
}

/// App state over the sample customers with scripted collaborators.
pub fn test_state(llm: ScriptedStreamer, feedback: Arc<dyn FeedbackSink>) -> AppState {
    let config = test_config();
    let generator = EmailGenerator::new(
        Arc::new(llm),
        Arc::new(sample_customers()),
        config.prompt_variant,
    );
    AppState {
        config: Arc::new(config),
        generator,
        feedback,
    }
}
