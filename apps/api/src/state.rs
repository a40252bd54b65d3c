use std::sync::Arc;

use crate::config::Config;
use crate::feedback::FeedbackSink;
use crate::generation::producer::EmailGenerator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Owns the LLM streamer, the customer store and the active prompt.
    pub generator: EmailGenerator,
    /// Pluggable feedback destination. Default: MlflowFeedbackSink.
    pub feedback: Arc<dyn FeedbackSink>,
}
