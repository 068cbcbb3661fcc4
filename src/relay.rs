//! Server-sent event frames relayed to chat clients.
//!
//! A turn emits, in order: one `sources` frame, zero or more delta frames in
//! the OpenAI streaming shape, then `[DONE]`. An upstream failure mid-stream
//! is reported as an `error` frame before `[DONE]`.
//!
//! ```text
//! data: {"sources":[{"documentName":"lease.pdf","chunkIndex":3,"content":"…"}]}
//!
//! data: {"choices":[{"delta":{"content":"The"}}]}
//!
//! data: [DONE]
//! ```

use axum::response::sse::Event;
use docqa_core::SourceRef;
use serde_json::json;

pub const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    Sources(Vec<SourceRef>),
    Delta(String),
    Error(String),
    Done,
}

impl RelayFrame {
    /// Payload of the frame's `data:` field.
    pub fn data(&self) -> String {
        match self {
            RelayFrame::Sources(sources) => json!({ "sources": sources }).to_string(),
            RelayFrame::Delta(content) => {
                json!({ "choices": [{ "delta": { "content": content } }] }).to_string()
            }
            RelayFrame::Error(message) => {
                json!({ "error": { "code": "upstream", "message": message } }).to_string()
            }
            RelayFrame::Done => DONE_MARKER.to_string(),
        }
    }

    pub fn into_event(self) -> Event {
        Event::default().data(self.data())
    }
}
