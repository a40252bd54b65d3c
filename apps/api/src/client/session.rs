//! One generate-click worth of client state.
//!
//! The session owns the accumulating buffer exclusively. Each event is applied
//! synchronously and the reconstructor re-runs before the next event is read.

use tracing::{debug, warn};

use crate::client::reconstruct::{reconstruct, PartialEmail};
use crate::models::email::{FeedbackRating, FeedbackRequest};
use crate::stream::StreamEvent;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FeedbackError {
    #[error("No trace id yet: wait for generation to finish before sending feedback")]
    MissingTrace,
}

/// What changed after applying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Buffer grew; the freshly reconstructed view.
    Progress(PartialEmail),
    /// Terminal success.
    Completed { trace_id: Option<String> },
    /// Terminal failure, message passed through verbatim.
    Failed(String),
    /// Unknown event type or an event after the terminal one.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct GenerationSession {
    customer_name: String,
    user_input: Option<String>,
    buffer: String,
    email: PartialEmail,
    complete: bool,
    trace_id: Option<String>,
    error: Option<String>,
}

impl GenerationSession {
    pub fn new(customer_name: impl Into<String>, user_input: Option<String>) -> Self {
        Self {
            customer_name: customer_name.into(),
            user_input: user_input.filter(|s| !s.trim().is_empty()),
            buffer: String::new(),
            email: reconstruct(""),
            complete: false,
            trace_id: None,
            error: None,
        }
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn user_input(&self) -> Option<&str> {
        self.user_input.as_deref()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn email(&self) -> &PartialEmail {
        &self.email
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    fn is_closed(&self) -> bool {
        self.complete || self.error.is_some()
    }

    pub fn apply(&mut self, event: &StreamEvent) -> SessionUpdate {
        if self.is_closed() {
            warn!("Event after stream end ignored: {:?}", event);
            return SessionUpdate::Ignored;
        }

        match event {
            StreamEvent::Token { content } => {
                self.buffer.push_str(content);
                // a final parse is frozen; later text cannot change it
                if self.email.is_partial {
                    self.email = reconstruct(&self.buffer);
                }
                SessionUpdate::Progress(self.email.clone())
            }
            StreamEvent::Done { trace_id } => {
                self.complete = true;
                self.trace_id = trace_id.clone().filter(|t| !t.is_empty());
                if self.email.is_partial {
                    self.email = reconstruct(&self.buffer);
                }
                SessionUpdate::Completed {
                    trace_id: self.trace_id.clone(),
                }
            }
            StreamEvent::Error { error } => {
                self.error = Some(error.clone());
                SessionUpdate::Failed(error.clone())
            }
            StreamEvent::Unknown => {
                debug!("Ignoring unknown stream event");
                SessionUpdate::Ignored
            }
        }
    }

    /// Binds a rating to this session's trace. Fails before any I/O when no trace is known.
    pub fn feedback(
        &self,
        rating: FeedbackRating,
        comment: Option<String>,
        sales_rep_name: Option<String>,
    ) -> Result<FeedbackRequest, FeedbackError> {
        let trace_id = self.trace_id.clone().ok_or(FeedbackError::MissingTrace)?;
        Ok(FeedbackRequest {
            trace_id,
            rating,
            comment: comment.filter(|c| !c.trim().is_empty()),
            sales_rep_name: sales_rep_name.filter(|n| !n.trim().is_empty()),
        })
    }
}
