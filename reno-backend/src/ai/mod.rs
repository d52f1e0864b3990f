pub mod mock;
pub mod qwen;
pub mod streaming;
pub mod types;

pub use mock::MockModel;
pub use qwen::QwenClient;
pub use streaming::{ModelEvent, ModelStream, TurnAccumulator};
pub use types::{AiError, ToolCall, ToolHistoryEntry, ToolResponse};

use crate::tools::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// The inference capability consumed by the router and the orchestration
/// loop. A generation accepts the conversation so far (plus any tool rounds
/// already completed this turn) and the tool schemas available to the model,
/// and yields an ordered stream of events.
///
/// Implementations are expected to be non-deterministic and fallible: tool
/// arguments in the returned stream may be malformed and are revalidated
/// against the registry schema before execution.
#[async_trait]
pub trait Inference: Send + Sync {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tool_history: Vec<ToolHistoryEntry>,
        tools: Vec<ToolDefinition>,
    ) -> Result<ModelStream, AiError>;
}
