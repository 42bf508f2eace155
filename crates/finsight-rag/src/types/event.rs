//! Streaming answer events
//!
//! A stream is exactly one [`StreamEvent::Contexts`], then zero or more
//! [`StreamEvent::Token`]s, then exactly one terminal event
//! ([`StreamEvent::Done`] or [`StreamEvent::Error`]). Nothing follows the
//! terminal event.
//!
//! The line-delimited JSON encoding is:
//!
//! ```text
//! {"type":"contexts","data":[{"id":..,"score":..,"text_content":..,"section_header":..,"source_url":..,"year":..}]}
//! {"type":"token","data":"<fragment>"}
//! {"type":"done"}
//! {"type":"error","data":"<reason>"}
//! ```

use serde::{Deserialize, Serialize};

use super::passage::Passage;

/// One event of a streamed answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Passages the answer is grounded on, always first
    Contexts(Vec<Passage>),
    /// Generated text fragment
    Token(String),
    /// Answer finished normally
    Done,
    /// Answer aborted after streaming began
    Error(String),
}

impl StreamEvent {
    /// Whether this event closes the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error(_))
    }

    /// Encode as one newline-terminated JSON line
    pub fn to_ndjson(&self) -> String {
        match serde_json::to_string(self) {
            Ok(mut line) => {
                line.push('\n');
                line
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to encode stream event");
                "{\"type\":\"error\",\"data\":\"event encoding failed\"}\n".to_string()
            }
        }
    }
}
