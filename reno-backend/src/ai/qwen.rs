use crate::ai::streaming::{create_model_stream, ModelEvent, ModelStream};
use crate::ai::types::{AiError, ToolHistoryEntry};
use crate::ai::{Inference, Message};
use crate::tools::ToolDefinition;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Client for an OpenAI-compatible chat-completions endpoint (Qwen via
/// DashScope compatible mode by default).
pub struct QwenClient {
    client: Client,
    auth_headers: header::HeaderMap,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn text(role: &str, content: String) -> Self {
        WireMessage {
            role: role.to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// Arguments as a JSON-encoded string, per the OpenAI wire format
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

const DEFAULT_ENDPOINT: &str =
    "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions";
const DEFAULT_MODEL: &str = "qwen-plus-2024-11-27";

impl QwenClient {
    pub fn new(api_key: &str, endpoint: Option<&str>, model: Option<&str>) -> Result<Self, String> {
        let mut auth_headers = header::HeaderMap::new();
        auth_headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| format!("Invalid API key format: {}", e))?;
        auth_headers.insert(header::AUTHORIZATION, auth_value);

        Ok(Self {
            client: crate::http::shared_client().clone(),
            auth_headers,
            endpoint: endpoint.unwrap_or(DEFAULT_ENDPOINT).to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            max_tokens: 4096,
        })
    }

    fn build_messages(
        messages: Vec<Message>,
        tool_history: Vec<ToolHistoryEntry>,
    ) -> Vec<WireMessage> {
        let mut wire: Vec<WireMessage> = messages
            .into_iter()
            .map(|m| WireMessage::text(m.role.as_str(), m.content))
            .collect();

        // Each completed tool round becomes an assistant message carrying the
        // tool_calls plus one `tool` role message per response.
        for entry in tool_history {
            let calls: Vec<WireToolCall> = entry
                .tool_calls
                .iter()
                .map(|tc| WireToolCall {
                    id: tc.id.clone(),
                    call_type: "function".to_string(),
                    function: WireFunctionCall {
                        name: tc.name.clone(),
                        arguments: tc.arguments.to_string(),
                    },
                })
                .collect();
            wire.push(WireMessage {
                role: "assistant".to_string(),
                content: None,
                tool_calls: Some(calls),
                tool_call_id: None,
            });
            for response in &entry.tool_responses {
                wire.push(WireMessage {
                    role: "tool".to_string(),
                    content: Some(response.content.clone()),
                    tool_calls: None,
                    tool_call_id: Some(response.tool_call_id.clone()),
                });
            }
        }

        wire
    }

    async fn request_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, AiError> {
        // Retry configuration for transient errors
        const MAX_RETRIES: u32 = 3;
        const BASE_DELAY_MS: u64 = 2000;

        let mut last_error: Option<AiError> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay_ms = BASE_DELAY_MS * (1 << (attempt - 1));
                log::warn!(
                    "[QWEN] Retry attempt {}/{} after {}ms delay",
                    attempt,
                    MAX_RETRIES,
                    delay_ms
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let request_result = self
                .client
                .post(&self.endpoint)
                .headers(self.auth_headers.clone())
                .json(request)
                .send()
                .await;

            let response = match request_result {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(AiError::new(format!("Qwen API request failed: {}", e)));
                    if attempt < MAX_RETRIES {
                        log::warn!(
                            "[QWEN] Request failed (attempt {}): {}, will retry",
                            attempt + 1,
                            e
                        );
                        continue;
                    }
                    return Err(last_error.unwrap());
                }
            };

            let status = response.status();
            let status_code = status.as_u16();
            let is_retryable = matches!(status_code, 429 | 502 | 503 | 504);

            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();

                if is_retryable && attempt < MAX_RETRIES {
                    log::warn!(
                        "[QWEN] Received retryable status {} (attempt {}), will retry",
                        status,
                        attempt + 1
                    );
                    last_error = Some(AiError::with_status(
                        format!("HTTP {}: {}", status, error_text),
                        status_code,
                    ));
                    continue;
                }

                let message = if let Ok(parsed) =
                    serde_json::from_str::<ApiErrorResponse>(&error_text)
                {
                    format!("Qwen API error: {}", parsed.error.message)
                } else {
                    format!("Qwen API returned error status: {}, body: {}", status, error_text)
                };
                return Err(AiError::with_status(message, status_code));
            }

            return response
                .json()
                .await
                .map_err(|e| AiError::new(format!("Failed to parse Qwen response: {}", e)));
        }

        Err(last_error.unwrap_or_else(|| AiError::new("Max retries exceeded")))
    }
}

#[async_trait]
impl Inference for QwenClient {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tool_history: Vec<ToolHistoryEntry>,
        tools: Vec<ToolDefinition>,
    ) -> Result<ModelStream, AiError> {
        let wire_tools: Vec<WireTool> = tools
            .into_iter()
            .map(|t| WireTool {
                tool_type: "function".to_string(),
                function: WireFunction {
                    name: t.name,
                    description: t.description,
                    parameters: serde_json::to_value(t.input_schema).unwrap_or_default(),
                },
            })
            .collect();

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: Self::build_messages(messages, tool_history),
            max_tokens: self.max_tokens,
            tools: if wire_tools.is_empty() {
                None
            } else {
                Some(wire_tools)
            },
        };

        log::debug!(
            "Sending request to Qwen API: {}",
            serde_json::to_string(&request).unwrap_or_default()
        );

        let response_data = self.request_completion(&request).await?;

        let choice = response_data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AiError::new("Qwen API returned no choices"))?;

        // The completion arrives buffered; relay it onto the stream in
        // generation order so consumers see one uniform event protocol.
        let (tx, rx) = create_model_stream();
        tokio::spawn(async move {
            if let Some(content) = choice.message.content {
                if !content.is_empty() {
                    let _ = tx.send(ModelEvent::ContentDelta { content }).await;
                }
            }
            for call in choice.message.tool_calls.unwrap_or_default() {
                // Tolerate malformed argument JSON here; the registry
                // revalidates against the tool schema before execution.
                let arguments = serde_json::from_str::<Value>(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments.clone()));
                let _ = tx
                    .send(ModelEvent::ToolUse {
                        id: call.id,
                        name: call.function.name,
                        arguments,
                    })
                    .await;
            }
            let _ = tx
                .send(ModelEvent::Done {
                    stop_reason: choice.finish_reason,
                })
                .await;
        });

        Ok(rx)
    }
}
