//! Email generation pipeline.
//!
//! Flow: resolve customer → format documents → build messages → stream tokens from
//! the serving endpoint → parse the accumulated text as `{subject_line, body}`.
//!
//! The pipeline is a stream of [`GenerationStep`]s that always ends with exactly one
//! terminal item: `Ok(Done)` or `Err(GenerationError)`. The SSE handler and the
//! non-streaming handler are both views over this one stream.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::generation::retrieval::{build_messages, CustomerStore};
use crate::llm_client::prompts::PromptVariant;
use crate::llm_client::{strip_json_fences, CompletionStreamer, LlmError};
use crate::models::email::{EmailDraft, EmailOutput, GenerateEmailRequest};
use crate::stream::StreamEvent;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Customer '{0}' not found")]
    CustomerNotFound(String),

    #[error("Failed to generate email: {0}")]
    Upstream(#[from] LlmError),

    #[error("Failed to parse email JSON: {0}")]
    MalformedOutput(#[from] serde_json::Error),

    #[error("Generation ended without a result")]
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationStep {
    Token(String),
    Done { trace_id: String, email: EmailDraft },
}

/// Opaque id correlating a generation with later feedback. `tr-` + 32 hex chars.
pub fn new_trace_id() -> String {
    format!("tr-{}", Uuid::new_v4().simple())
}

/// Parses the model's full output, tolerating a markdown code fence around it.
pub fn parse_email(text: &str) -> Result<EmailDraft, serde_json::Error> {
    serde_json::from_str(strip_json_fences(text))
}

#[derive(Clone)]
pub struct EmailGenerator {
    llm: Arc<dyn CompletionStreamer>,
    customers: Arc<CustomerStore>,
    prompt: PromptVariant,
}

impl EmailGenerator {
    pub fn new(
        llm: Arc<dyn CompletionStreamer>,
        customers: Arc<CustomerStore>,
        prompt: PromptVariant,
    ) -> Self {
        Self {
            llm,
            customers,
            prompt,
        }
    }

    pub fn customers(&self) -> &CustomerStore {
        &self.customers
    }

    pub fn prompt(&self) -> PromptVariant {
        self.prompt
    }

    /// Runs one generation. Dropping the returned stream abandons the upstream call.
    pub fn generate(
        &self,
        request: GenerateEmailRequest,
    ) -> impl Stream<Item = Result<GenerationStep, GenerationError>> + Send + 'static {
        let llm = Arc::clone(&self.llm);
        let customers = Arc::clone(&self.customers);
        let system_prompt = self.prompt.template();

        async_stream::stream! {
            let trace_id = new_trace_id();
            let user_input = request
                .user_input
                .filter(|s| !s.trim().is_empty());
            let user_instructions = if user_input.is_some() { "yes" } else { "no" };
            let span = info_span!(
                "generate_email",
                trace_id = %trace_id,
                customer = %request.customer_name,
                user_instructions,
            );

            let documents = match customers.documents(&request.customer_name) {
                Some(documents) => documents,
                None => {
                    warn!(parent: &span, "Unknown customer");
                    yield Err(GenerationError::CustomerNotFound(request.customer_name));
                    return;
                }
            };

            let messages = build_messages(system_prompt, &documents, user_input.as_deref());
            info!(parent: &span, "Calling {} with {} documents", llm.model(), documents.len());

            let mut tokens = match llm.stream_chat(&messages).instrument(span.clone()).await {
                Ok(tokens) => tokens,
                Err(e) => {
                    error!(parent: &span, "Serving call failed: {e}");
                    yield Err(GenerationError::Upstream(e));
                    return;
                }
            };

            let mut full_response = String::new();
            let mut token_count = 0usize;
            while let Some(token) = tokens.next().instrument(span.clone()).await {
                match token {
                    Ok(token) => {
                        token_count += 1;
                        full_response.push_str(&token);
                        yield Ok(GenerationStep::Token(token));
                    }
                    Err(e) => {
                        error!(parent: &span, "Stream failed after {token_count} tokens: {e}");
                        yield Err(GenerationError::Upstream(e));
                        return;
                    }
                }
            }

            match parse_email(&full_response) {
                Ok(email) => {
                    info!(parent: &span, "Generated email from {token_count} tokens");
                    yield Ok(GenerationStep::Done { trace_id, email });
                }
                Err(e) => {
                    warn!(parent: &span, "Model output is not email JSON: {e}");
                    yield Err(GenerationError::MalformedOutput(e));
                }
            }
        }
    }

    /// The generation as wire events: one `token` per step, then `done` or `error`.
    pub fn stream_events(
        &self,
        request: GenerateEmailRequest,
    ) -> impl Stream<Item = StreamEvent> + Send + 'static {
        self.generate(request).map(|step| match step {
            Ok(GenerationStep::Token(content)) => StreamEvent::Token { content },
            Ok(GenerationStep::Done { trace_id, .. }) => StreamEvent::done(trace_id),
            Err(e) => StreamEvent::error(e.to_string()),
        })
    }

    /// Runs the generation to completion and returns only the final email.
    pub async fn generate_complete(
        &self,
        request: GenerateEmailRequest,
    ) -> Result<EmailOutput, GenerationError> {
        let steps = self.generate(request);
        futures::pin_mut!(steps);

        while let Some(step) = steps.next().await {
            match step? {
                GenerationStep::Token(_) => {}
                GenerationStep::Done { trace_id, email } => {
                    return Ok(EmailOutput {
                        subject_line: email.subject_line,
                        body: email.body,
                        trace_id: Some(trace_id),
                    });
                }
            }
        }
        Err(GenerationError::Interrupted)
    }
}
