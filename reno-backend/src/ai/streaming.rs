//! Streaming inference response types and utilities
//!
//! A model generation is delivered as an ordered sequence of `ModelEvent`s on
//! a bounded channel, allowing incremental consumption of text and tool-call
//! intents while a generation is still in flight.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::ai::types::ToolCall;

/// Events emitted during a single model generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelEvent {
    /// Content is being generated incrementally
    ContentDelta {
        /// The new content chunk
        content: String,
    },
    /// The model requests a tool invocation (arguments fully parsed)
    ToolUse {
        /// Unique ID for this tool call
        id: String,
        /// Tool name
        name: String,
        /// Arguments as supplied by the model (revalidated before execution)
        arguments: Value,
    },
    /// Generation has completed
    Done {
        /// Stop reason (e.g., "stop", "tool_calls", "length")
        stop_reason: Option<String>,
    },
    /// The generation stream failed mid-flight
    Error {
        /// Error message
        message: String,
    },
}

/// Sender half of a model event stream
pub type ModelStreamSender = mpsc::Sender<ModelEvent>;

/// Receiver half of a model event stream
pub type ModelStream = mpsc::Receiver<ModelEvent>;

/// Create a new model event channel with the default buffer size (32)
pub fn create_model_stream() -> (ModelStreamSender, ModelStream) {
    mpsc::channel(32)
}

/// Accumulator that rebuilds a complete turn from stream events
#[derive(Debug, Clone, Default)]
pub struct TurnAccumulator {
    /// Accumulated text content
    pub content: String,
    /// Tool calls requested during the turn, in arrival order
    pub tool_calls: Vec<ToolCall>,
    /// Stop reason from the Done event
    pub stop_reason: Option<String>,
    /// Any error that occurred mid-stream
    pub error: Option<String>,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a stream event and update accumulator state
    pub fn process_event(&mut self, event: &ModelEvent) {
        match event {
            ModelEvent::ContentDelta { content } => {
                self.content.push_str(content);
            }
            ModelEvent::ToolUse { id, name, arguments } => {
                self.tool_calls.push(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                });
            }
            ModelEvent::Done { stop_reason } => {
                self.stop_reason = stop_reason.clone();
            }
            ModelEvent::Error { message } => {
                self.error = Some(message.clone());
            }
        }
    }

    /// Check if the stream reached a terminal event
    pub fn is_complete(&self) -> bool {
        self.stop_reason.is_some() || self.error.is_some()
    }

    /// Check if there was an error
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Check if the turn requested any tool invocations
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_accumulator_text() {
        let mut acc = TurnAccumulator::new();

        acc.process_event(&ModelEvent::ContentDelta {
            content: "您好".to_string(),
        });
        acc.process_event(&ModelEvent::ContentDelta {
            content: "，我是装修助手".to_string(),
        });

        assert_eq!(acc.content, "您好，我是装修助手");
        assert!(!acc.is_complete());

        acc.process_event(&ModelEvent::Done {
            stop_reason: Some("stop".to_string()),
        });

        assert!(acc.is_complete());
        assert!(!acc.wants_tools());
    }

    #[test]
    fn test_turn_accumulator_tool_use() {
        let mut acc = TurnAccumulator::new();

        acc.process_event(&ModelEvent::ToolUse {
            id: "call_1".to_string(),
            name: "query_company_database".to_string(),
            arguments: serde_json::json!({"location": "北京", "limit": 3}),
        });
        acc.process_event(&ModelEvent::Done {
            stop_reason: Some("tool_calls".to_string()),
        });

        assert!(acc.wants_tools());
        assert_eq!(acc.tool_calls.len(), 1);
        assert_eq!(acc.tool_calls[0].name, "query_company_database");
    }

    #[test]
    fn test_turn_accumulator_error() {
        let mut acc = TurnAccumulator::new();
        acc.process_event(&ModelEvent::Error {
            message: "stream reset".to_string(),
        });
        assert!(acc.is_complete());
        assert!(acc.has_error());
    }
}
