//! Wire envelope for events pushed to gateway WebSocket clients.

use crate::session::{SessionEvent, TerminalState};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEvent {
    /// Dotted event name, e.g. "agent.tool_call"
    pub event: String,
    pub data: Value,
    pub timestamp: String,
}

impl GatewayEvent {
    fn new(event: &str, data: Value) -> Self {
        GatewayEvent {
            event: event.to_string(),
            data,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn session_started(session_id: Uuid, request: &str) -> Self {
        GatewayEvent::new(
            "session.started",
            serde_json::json!({
                "session_id": session_id,
                "request": request,
            }),
        )
    }

    pub fn session_completed(session_id: Uuid, state: TerminalState) -> Self {
        GatewayEvent::new(
            "session.completed",
            serde_json::json!({
                "session_id": session_id,
                "state": state,
            }),
        )
    }

    /// Wrap a session event for broadcast, tagged with its session and agent
    pub fn session_event(session_id: Uuid, agent: &str, event: &SessionEvent) -> Self {
        let name = match event.kind() {
            "text_delta" => "agent.text_delta",
            "tool_call" => "agent.tool_call",
            "tool_result" => "tool.result",
            _ => "session.error",
        };
        GatewayEvent::new(
            name,
            serde_json::json!({
                "session_id": session_id,
                "agent": agent,
                "payload": event,
            }),
        )
    }
}

/// Minimal RPC request accepted on the gateway socket (ping only)
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: String,
    pub method: String,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RpcResponse {
    pub fn success(id: String, result: Value) -> Self {
        RpcResponse {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: String, error: impl Into<String>) -> Self {
        RpcResponse {
            id,
            result: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_events_map_to_dotted_names() {
        let id = Uuid::new_v4();
        let event = GatewayEvent::session_event(
            id,
            "web_search",
            &SessionEvent::ToolCall {
                id: "call_1".to_string(),
                tool: "search_web".to_string(),
                arguments: serde_json::json!({"query": "趋势"}),
            },
        );
        assert_eq!(event.event, "agent.tool_call");
        assert_eq!(event.data["agent"], "web_search");

        let event = GatewayEvent::session_event(
            id,
            "web_search",
            &SessionEvent::Error {
                message: "boom".to_string(),
            },
        );
        assert_eq!(event.event, "session.error");
    }
}
