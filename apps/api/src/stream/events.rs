//! Wire events for the email generation stream.
//!
//! Every frame is `data: <json>\n\n` where `<json>` is one of:
//! - `{"type":"token","content":"..."}`: raw model text, in emission order
//! - `{"type":"done","trace_id":"..."}`: terminal, success
//! - `{"type":"error","error":"..."}`: terminal, failure
//!
//! Consumers must ignore types they do not know, so decoding never fails on `type`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Token {
        content: String,
    },
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace_id: Option<String>,
    },
    Error {
        error: String,
    },
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    pub fn token(content: impl Into<String>) -> Self {
        StreamEvent::Token {
            content: content.into(),
        }
    }

    pub fn done(trace_id: impl Into<String>) -> Self {
        StreamEvent::Done {
            trace_id: Some(trace_id.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            error: message.into(),
        }
    }

    /// `done` and `error` close the stream; nothing follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }

    /// Serializes the event as the JSON payload of a single `data:` frame.
    pub fn to_frame_payload(&self) -> String {
        // Every variant is plain strings; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"unknown"}"#.to_string())
    }

    /// Decodes a frame payload. Payloads that are not JSON objects at all return `None`.
    pub fn from_frame_payload(payload: &str) -> Option<Self> {
        serde_json::from_str(payload).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_wire_shape_is_exact() {
        let event = StreamEvent::token("Hi");
        assert_eq!(event.to_frame_payload(), r#"{"type":"token","content":"Hi"}"#);
    }

    #[test]
    fn test_done_wire_shape_is_exact() {
        let event = StreamEvent::done("tr-abc");
        assert_eq!(event.to_frame_payload(), r#"{"type":"done","trace_id":"tr-abc"}"#);
    }

    #[test]
    fn test_error_wire_shape_is_exact() {
        let event = StreamEvent::error("boom");
        assert_eq!(event.to_frame_payload(), r#"{"type":"error","error":"boom"}"#);
    }

    #[test]
    fn test_unknown_type_decodes_to_unknown() {
        let event = StreamEvent::from_frame_payload(r#"{"type":"usage","tokens":12}"#);
        assert_eq!(event, Some(StreamEvent::Unknown));
    }

    #[test]
    fn test_done_without_trace_id_still_decodes() {
        let event = StreamEvent::from_frame_payload(r#"{"type":"done"}"#);
        assert_eq!(event, Some(StreamEvent::Done { trace_id: None }));
    }

    #[test]
    fn test_non_json_payload_is_none() {
        assert_eq!(StreamEvent::from_frame_payload("[DONE]"), None);
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!StreamEvent::token("x").is_terminal());
        assert!(StreamEvent::done("t").is_terminal());
        assert!(StreamEvent::error("e").is_terminal());
        assert!(!StreamEvent::Unknown.is_terminal());
    }
}
