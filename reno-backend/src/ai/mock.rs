//! Scripted in-process model used when no API key is configured and by
//! integration-style tests. Mirrors the behavior of a real provider closely
//! enough to exercise the full orchestration path: it answers company
//! recommendation requests with a tool round first, everything else with
//! plain text.

use crate::ai::streaming::{create_model_stream, ModelEvent, ModelStream};
use crate::ai::types::{AiError, ToolHistoryEntry};
use crate::ai::{Inference, Message, MessageRole};
use crate::tools::ToolDefinition;
use async_trait::async_trait;

pub struct MockModel;

const GREETING: &str =
    "您好！我是装修助手，可以帮助您解决装修相关问题。请问您有什么具体的装修需求或问题需要咨询吗？";

const RECOMMENDATION: &str = "根据您的需求，我为您查询了北京地区的装修公司，\
并按评分和价格范围整理了推荐结果。建议您优先考虑评分高、价格范围符合预算的公司，\
并在签约前实地考察其施工中的工地。您需要了解某家公司的更多评价信息吗？";

/// Split a response into small chunks so consumers observe genuine
/// incremental delivery rather than one monolithic delta.
fn chunked(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(12).map(|c| c.iter().collect()).collect()
}

#[async_trait]
impl Inference for MockModel {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tool_history: Vec<ToolHistoryEntry>,
        tools: Vec<ToolDefinition>,
    ) -> Result<ModelStream, AiError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let wants_recommendation = last_user.contains("推荐") && last_user.contains("公司");
        let can_query = tools.iter().any(|t| t.name == "query_company_database");

        let (tx, rx) = create_model_stream();
        tokio::spawn(async move {
            if wants_recommendation && can_query && tool_history.is_empty() {
                let _ = tx
                    .send(ModelEvent::ToolUse {
                        id: "call_mock_1".to_string(),
                        name: "query_company_database".to_string(),
                        arguments: serde_json::json!({"location": "北京", "limit": 3}),
                    })
                    .await;
                let _ = tx
                    .send(ModelEvent::Done {
                        stop_reason: Some("tool_calls".to_string()),
                    })
                    .await;
                return;
            }

            let text = if tool_history.is_empty() {
                GREETING
            } else {
                RECOMMENDATION
            };
            for chunk in chunked(text) {
                if tx.send(ModelEvent::ContentDelta { content: chunk }).await.is_err() {
                    return;
                }
            }
            let _ = tx
                .send(ModelEvent::Done {
                    stop_reason: Some("stop".to_string()),
                })
                .await;
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::TurnAccumulator;
    use crate::tools::builtin::create_default_registry;

    async fn collect(mut stream: ModelStream) -> TurnAccumulator {
        let mut acc = TurnAccumulator::new();
        while let Some(event) = stream.recv().await {
            acc.process_event(&event);
        }
        acc
    }

    #[tokio::test]
    async fn recommendation_request_triggers_company_query() {
        let registry = create_default_registry();
        let tools = registry.definitions();
        let stream = MockModel
            .generate(
                vec![Message::user("请帮我推荐几家北京的装修公司")],
                vec![],
                tools,
            )
            .await
            .unwrap();

        let acc = collect(stream).await;
        assert!(acc.wants_tools());
        assert_eq!(acc.tool_calls[0].name, "query_company_database");
    }

    #[tokio::test]
    async fn plain_question_streams_text_only() {
        let stream = MockModel
            .generate(vec![Message::user("你好")], vec![], vec![])
            .await
            .unwrap();

        let acc = collect(stream).await;
        assert!(!acc.wants_tools());
        assert!(acc.content.contains("装修助手"));
        assert_eq!(acc.stop_reason.as_deref(), Some("stop"));
    }
}
