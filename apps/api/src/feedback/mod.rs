//! Feedback forwarding: thumbs up/down on a finished generation, keyed by its trace id.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use axum::{extract::State, Json};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::errors::AppError;
use crate::models::email::{FeedbackRequest, FeedbackResponse};
use crate::state::AppState;

pub const ASSESSMENT_NAME: &str = "user_feedback";
const DEFAULT_SOURCE_ID: &str = "user";

/// A validated piece of feedback ready to be recorded against a trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackSubmission {
    pub trace_id: String,
    pub value: bool,
    pub comment: Option<String>,
    pub source_id: String,
}

impl FeedbackSubmission {
    pub fn from_request(request: FeedbackRequest) -> Self {
        Self {
            trace_id: request.trace_id,
            value: request.rating.is_positive(),
            comment: request.comment.filter(|c| !c.trim().is_empty()),
            source_id: request
                .sales_rep_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SOURCE_ID.to_string()),
        }
    }
}

/// Where feedback ends up. Swappable so handlers can be tested without a workspace.
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn log_feedback(&self, submission: &FeedbackSubmission) -> anyhow::Result<()>;
}

/// Which sink `POST /api/feedback` writes to, chosen by `FEEDBACK_SINK`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedbackSinkKind {
    #[default]
    Log,
    Mlflow,
}

impl FromStr for FeedbackSinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(FeedbackSinkKind::Log),
            "mlflow" => Ok(FeedbackSinkKind::Mlflow),
            other => Err(format!(
                "unknown feedback sink '{other}' (expected 'log' or 'mlflow')"
            )),
        }
    }
}

/// Writes feedback to the service log.
///
/// Trace ids are minted locally and never exported, so this is the only sink
/// that can record feedback for them.
#[derive(Debug, Default)]
pub struct LogFeedbackSink;

#[async_trait]
impl FeedbackSink for LogFeedbackSink {
    async fn log_feedback(&self, submission: &FeedbackSubmission) -> anyhow::Result<()> {
        info!(
            assessment = ASSESSMENT_NAME,
            trace_id = %submission.trace_id,
            positive = submission.value,
            source_id = %submission.source_id,
            comment = submission.comment.as_deref().unwrap_or(""),
            "User feedback"
        );
        Ok(())
    }
}

/// Records feedback as an MLflow assessment on the trace.
///
/// Only succeeds for traces that exist in the workspace.
pub struct MlflowFeedbackSink {
    client: Client,
    host: String,
    token: String,
}

impl MlflowFeedbackSink {
    pub fn new(host: String, token: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build feedback HTTP client")?;
        Ok(Self {
            client,
            host,
            token,
        })
    }

    fn endpoint_url(&self, trace_id: &str) -> String {
        format!("{}/api/3.0/mlflow/traces/{trace_id}/assessments", self.host)
    }
}

pub fn assessment_body(submission: &FeedbackSubmission) -> Value {
    let mut assessment = json!({
        "assessment_name": ASSESSMENT_NAME,
        "trace_id": submission.trace_id,
        "source": {
            "source_type": "HUMAN",
            "source_id": submission.source_id,
        },
        "feedback": { "value": submission.value },
    });
    if let Some(comment) = &submission.comment {
        assessment["rationale"] = json!(comment);
    }
    json!({ "assessment": assessment })
}

#[async_trait]
impl FeedbackSink for MlflowFeedbackSink {
    async fn log_feedback(&self, submission: &FeedbackSubmission) -> anyhow::Result<()> {
        let response = self
            .client
            .post(self.endpoint_url(&submission.trace_id))
            .bearer_auth(&self.token)
            .json(&assessment_body(submission))
            .send()
            .await
            .context("Assessment request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("MLflow returned {status}: {text}");
        }
        Ok(())
    }
}

/// POST /api/feedback
///
/// Sink failures are reported in the body with `success: false`, not as an HTTP error.
pub async fn handle_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, AppError> {
    if request.trace_id.trim().is_empty() {
        return Err(AppError::Validation("trace_id cannot be empty".to_string()));
    }

    let submission = FeedbackSubmission::from_request(request);
    let response = match state.feedback.log_feedback(&submission).await {
        Ok(()) => {
            info!(
                trace_id = %submission.trace_id,
                positive = submission.value,
                "Feedback recorded"
            );
            FeedbackResponse {
                success: true,
                message: "Feedback submitted successfully".to_string(),
            }
        }
        Err(e) => {
            error!(trace_id = %submission.trace_id, "Feedback submission failed: {e:#}");
            FeedbackResponse {
                success: false,
                message: format!("Error submitting feedback: {e}"),
            }
        }
    };
    Ok(Json(response))
}
