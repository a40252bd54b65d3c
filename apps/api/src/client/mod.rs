//! HTTP client for the demo API: catalog lookups, progressive email generation
//! and feedback submission.

pub mod reconstruct;
pub mod session;

use eventsource_stream::EventStreamError;
use futures::{Stream, StreamExt};
use reqwest::{Client, Response, Url};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::generation::retrieval::CompanySummary;
use crate::models::email::{FeedbackRating, FeedbackResponse, GenerateEmailRequest};
use crate::stream::{decode_events, StreamEvent};

pub use reconstruct::{reconstruct, PartialEmail};
pub use session::{FeedbackError, GenerationSession, SessionUpdate};

const STREAM_PATH: &str = "api/generate-email-stream-with-retrieval/";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed event stream: {0}")]
    Stream(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Feedback(#[from] FeedbackError),
}

#[derive(Debug, Clone)]
pub struct DemoClient {
    http: Client,
    base_url: Url,
}

impl DemoClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        // a trailing slash makes `join` append instead of replacing the last segment
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))
    }

    pub async fn companies(&self) -> Result<Vec<CompanySummary>, ClientError> {
        let response = self.http.get(self.url("api/companies")?).send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    pub async fn customer(&self, name: &str) -> Result<Value, ClientError> {
        let mut url = self.url("api/customer/")?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(name);
        let response = self.http.get(url).send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Opens the event stream for one generation. Dropping the stream closes the request.
    pub async fn generate_stream(
        &self,
        request: &GenerateEmailRequest,
    ) -> Result<impl Stream<Item = Result<StreamEvent, ClientError>>, ClientError> {
        let response = self
            .http
            .post(self.url(STREAM_PATH)?)
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(decode_events(response.bytes_stream()).map(|item| {
            item.map_err(|e| match e {
                EventStreamError::Transport(e) => ClientError::Http(e),
                other => ClientError::Stream(other.to_string()),
            })
        }))
    }

    /// Drives `session` through a full generation, calling `on_update` after every event.
    ///
    /// Only a failure to open the stream is returned as an error. Anything after that,
    /// including a dropped connection, ends up as the session's error message.
    pub async fn generate(
        &self,
        session: &mut GenerationSession,
        mut on_update: impl FnMut(&GenerationSession, &SessionUpdate),
    ) -> Result<(), ClientError> {
        let request = GenerateEmailRequest {
            customer_name: session.customer_name().to_string(),
            user_input: session.user_input().map(str::to_string),
        };
        let events = self.generate_stream(&request).await?;
        futures::pin_mut!(events);

        while let Some(event) = events.next().await {
            let event = event.unwrap_or_else(|e| {
                warn!("Stream transport failed: {e}");
                StreamEvent::error(format!("Connection lost: {e}"))
            });
            let update = session.apply(&event);
            on_update(session, &update);
            if matches!(update, SessionUpdate::Completed { .. } | SessionUpdate::Failed(_)) {
                break;
            }
        }

        if !session.is_complete() && session.error().is_none() {
            let update = session.apply(&StreamEvent::error("Stream ended before completion"));
            on_update(session, &update);
        }
        debug!(
            complete = session.is_complete(),
            trace_id = session.trace_id().unwrap_or(""),
            "Generation finished"
        );
        Ok(())
    }

    /// Sends one feedback request for the session's trace. Never retried.
    pub async fn submit_feedback(
        &self,
        session: &GenerationSession,
        rating: FeedbackRating,
        comment: Option<String>,
        sales_rep_name: Option<String>,
    ) -> Result<FeedbackResponse, ClientError> {
        let request = session.feedback(rating, comment, sales_rep_name)?;
        let response = self
            .http
            .post(self.url("api/feedback")?)
            .json(&request)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(body);
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}
