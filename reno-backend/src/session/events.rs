//! The caller-facing typed event stream.
//!
//! Events within one session are strictly ordered: a `tool_call` always
//! precedes its matching `tool_result`, and `text_delta` fragments
//! concatenate in emission order to the full text.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Incremental text fragment
    TextDelta { content: String },
    /// A tool invocation requested by the agent
    ToolCall {
        id: String,
        tool: String,
        arguments: Value,
    },
    /// The outcome of a tool invocation. Exactly one of `output` / `error`
    /// is set; at most one result ever follows a given call.
    ToolResult {
        id: String,
        tool: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Terminal failure description
    Error { message: String },
}

impl SessionEvent {
    /// Short name used for gateway event routing and logging
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::TextDelta { .. } => "text_delta",
            SessionEvent::ToolCall { .. } => "tool_call",
            SessionEvent::ToolResult { .. } => "tool_result",
            SessionEvent::Error { .. } => "error",
        }
    }
}

pub type EventSender = mpsc::Sender<SessionEvent>;
pub type EventReceiver = mpsc::Receiver<SessionEvent>;

/// Create a session event channel with the default buffer size (64)
pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(64)
}
