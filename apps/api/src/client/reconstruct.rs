//! Incremental JSON reconstructor.
//!
//! Turns any prefix of a serialized `{"subject_line": "...", "body": "..."}`
//! object into best-effort fields for progressive display. Never fails: input
//! that cannot be understood degrades to `None` fields.
//!
//! Scanning is a forward-only state machine:
//!
//! ```text
//! BeforeSubject ──"subject_line":"──▶ InSubject ──unescaped "──▶ AfterSubject
//!       │                                                            │
//!       └──────────────────"body":"─────────────▶ InBody ◀──"body":"─┘
//! ```
//!
//! `Complete` is only reached when the whole buffer parses as strict JSON.

use serde::{Deserialize, Serialize};

use crate::llm_client::strip_json_fences;

const SUBJECT_KEY: &str = "subject_line";
const BODY_KEY: &str = "body";

/// Best-effort view of the email while it is still streaming.
///
/// Once `is_partial` is false both fields are populated and final.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialEmail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(rename = "isPartial")]
    pub is_partial: bool,
}

impl PartialEmail {
    fn partial(subject_line: Option<String>, body: Option<String>) -> Self {
        Self {
            subject_line,
            body,
            is_partial: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanState {
    BeforeSubject,
    InSubject { start: usize },
    AfterSubject { from: usize },
    InBody { start: usize },
    Complete(PartialEmail),
}

/// Reconstructs the email from the accumulated stream buffer.
pub fn reconstruct(buffer: &str) -> PartialEmail {
    let mut subject_line = None;
    let mut body = None;
    let mut state = match parse_complete(buffer) {
        Some(email) => ScanState::Complete(email),
        None => ScanState::BeforeSubject,
    };

    loop {
        state = match state {
            ScanState::BeforeSubject => {
                let subject = find_string_field(buffer, 0, SUBJECT_KEY);
                let body_open = find_string_field(buffer, 0, BODY_KEY);
                match (subject, body_open) {
                    (Some(s), Some(b)) if b < s => ScanState::InBody { start: b },
                    (Some(s), _) => ScanState::InSubject { start: s },
                    (None, Some(b)) => ScanState::InBody { start: b },
                    (None, None) => break,
                }
            }
            ScanState::InSubject { start } => match find_closing_quote(buffer, start) {
                Some(end) => {
                    subject_line = Some(unescape(&buffer[start..end]));
                    ScanState::AfterSubject { from: end + 1 }
                }
                // unterminated subject: nothing to show yet
                None => break,
            },
            ScanState::AfterSubject { from } => match find_string_field(buffer, from, BODY_KEY) {
                Some(start) => ScanState::InBody { start },
                None => break,
            },
            ScanState::InBody { start } => {
                body = Some(provisional_body(&buffer[start..]));
                break;
            }
            ScanState::Complete(email) => return email,
        };
    }

    PartialEmail::partial(subject_line, body)
}

/// Strict parse of the whole buffer. Only an object with both string fields counts.
fn parse_complete(buffer: &str) -> Option<PartialEmail> {
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(strip_json_fences(trimmed)).ok()?;
    let subject_line = value.get(SUBJECT_KEY)?.as_str()?.to_string();
    let body = value.get(BODY_KEY)?.as_str()?.to_string();
    Some(PartialEmail {
        subject_line: Some(subject_line),
        body: Some(body),
        is_partial: false,
    })
}

/// Finds `"<key>"`, optional whitespace, `:`, optional whitespace, `"` at or after `from`.
/// Returns the byte offset just past the opening quote of the value.
fn find_string_field(buffer: &str, from: usize, key: &str) -> Option<usize> {
    let needle = format!("\"{key}\"");
    let mut cursor = from;

    while let Some(found) = buffer.get(cursor..)?.find(&needle) {
        let after_key = cursor + found + needle.len();
        let rest = &buffer[after_key..];
        let rest_trimmed = rest.trim_start();
        if let Some(after_colon) = rest_trimmed.strip_prefix(':') {
            let value = after_colon.trim_start();
            if value.starts_with('"') {
                let consumed = buffer.len() - value.len();
                return Some(consumed + 1);
            }
            if value.is_empty() {
                // key and colon arrived, value quote not yet
                return None;
            }
        }
        cursor = after_key;
    }
    None
}

/// Offset of the next `"` not preceded by an escaping backslash.
fn find_closing_quote(buffer: &str, start: usize) -> Option<usize> {
    let mut escaped = false;
    for (offset, ch) in buffer[start..].char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(start + offset),
            _ => {}
        }
    }
    None
}

/// Everything after the body's opening quote, minus the start of the closing syntax.
///
/// A trailing `"}` or lone `"` is taken to be the closing marker. A body whose real last
/// character is an escaped quote therefore shows without it until the object completes.
fn provisional_body(tail: &str) -> String {
    let tail = tail
        .strip_suffix("\"}")
        .or_else(|| tail.strip_suffix('"'))
        .unwrap_or(tail);

    // half of an escape sequence; wait for the next chunk
    let trailing_backslashes = tail.chars().rev().take_while(|c| *c == '\\').count();
    let tail = if trailing_backslashes % 2 == 1 {
        &tail[..tail.len() - 1]
    } else {
        tail
    };

    unescape(tail)
}

/// `\n`, then `\"`, then `\\`. The backslash pass runs last so its output is not rescanned.
fn unescape(raw: &str) -> String {
    raw.replace("\\n", "\n")
        .replace("\\\"", "\"")
        .replace("\\\\", "\\")
}
