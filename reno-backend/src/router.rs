//! Policy-driven request routing.
//!
//! The router is itself a model call: it sees every agent's name and
//! one-line responsibility and must answer with a JSON decision, optionally
//! decomposing the request into per-agent sub-requests. Routing is advisory:
//! a wrong choice degrades to an agent explaining it cannot help, and an
//! empty or unparseable decision falls back to the general-knowledge agent
//! rather than failing the session.

use crate::agents::AgentSet;
use crate::ai::{Inference, Message, TurnAccumulator};
use crate::session::SessionError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAssignment {
    pub agent: String,
    pub request: String,
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    #[serde(default)]
    assignments: Vec<RawAssignment>,
}

#[derive(Debug, Deserialize)]
struct RawAssignment {
    agent: String,
    #[serde(default)]
    request: Option<String>,
}

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*\n?([\s\S]*?)\n?```").unwrap());

pub struct Router {
    model: Arc<dyn Inference>,
}

impl Router {
    pub fn new(model: Arc<dyn Inference>) -> Self {
        Router { model }
    }

    fn build_routing_prompt(agents: &AgentSet) -> String {
        let mut prompt = String::from(
            "你是一个装修协调系统，负责将用户查询路由到适当的专业代理。\n\n可用的代理有：\n",
        );
        for agent in agents.iter() {
            prompt.push_str(&format!("- {}：{}\n", agent.name, agent.responsibility));
        }
        prompt.push_str(
            "\n分析用户查询，选择最有帮助的一个或多个代理。如果需要多个代理，\
             将查询拆分为每个代理的子请求。\n\
             只输出JSON，格式为：\n\
             {\"assignments\": [{\"agent\": \"<代理名>\", \"request\": \"<转发给该代理的请求>\"}]}\n\
             无法确定合适的代理时，输出 {\"assignments\": []}。",
        );
        prompt
    }

    /// Decide which agent(s) handle `request`, in order.
    ///
    /// Errors: a model failure is `CapabilityUnavailable`; a decision naming
    /// an agent that does not exist is a `PolicyViolation`. Both are
    /// session-fatal. Everything else resolves to at least one assignment.
    pub async fn route(
        &self,
        request: &str,
        agents: &AgentSet,
    ) -> Result<Vec<RouteAssignment>, SessionError> {
        let messages = vec![
            Message::system(Self::build_routing_prompt(agents)),
            Message::user(request),
        ];

        let mut stream = self
            .model
            .generate(messages, vec![], vec![])
            .await
            .map_err(|e| {
                SessionError::CapabilityUnavailable(format!("router inference failed: {}", e))
            })?;

        let mut acc = TurnAccumulator::new();
        while let Some(event) = stream.recv().await {
            acc.process_event(&event);
        }
        if let Some(error) = acc.error {
            return Err(SessionError::CapabilityUnavailable(format!(
                "router stream failed: {}",
                error
            )));
        }

        let decision = parse_decision(&acc.content);

        let raw = match decision {
            Some(d) if !d.assignments.is_empty() => d.assignments,
            _ => {
                log::warn!(
                    "[ROUTER] Empty or unparseable decision, falling back to '{}'",
                    agents.fallback().name
                );
                return Ok(vec![RouteAssignment {
                    agent: agents.fallback().name.clone(),
                    request: request.to_string(),
                }]);
            }
        };

        let mut assignments = Vec::with_capacity(raw.len());
        for assignment in raw {
            if agents.get(&assignment.agent).is_none() {
                return Err(SessionError::PolicyViolation(format!(
                    "Router selected nonexistent agent '{}'",
                    assignment.agent
                )));
            }
            assignments.push(RouteAssignment {
                agent: assignment.agent,
                request: assignment
                    .request
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| request.to_string()),
            });
        }

        log::info!(
            "[ROUTER] Decision: {:?}",
            assignments.iter().map(|a| &a.agent).collect::<Vec<_>>()
        );

        Ok(assignments)
    }
}

/// Parse a routing decision from model output, tolerating markdown code
/// fences and surrounding prose.
fn parse_decision(content: &str) -> Option<RawDecision> {
    let content = content.trim();

    // Try direct JSON parse first
    if let Ok(decision) = serde_json::from_str::<RawDecision>(content) {
        return Some(decision);
    }

    // Try to extract JSON from markdown code blocks
    if let Some(captures) = FENCED_JSON.captures(content) {
        if let Some(json_match) = captures.get(1) {
            if let Ok(decision) = serde_json::from_str::<RawDecision>(json_match.as_str().trim()) {
                return Some(decision);
            }
        }
    }

    // Try to find a JSON object anywhere in the content
    if let Some(start) = content.find('{') {
        let mut depth = 0;
        let mut end = start;
        for (i, c) in content[start..].char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = start + i + 1;
                        break;
                    }
                }
                _ => {}
            }
        }
        if end > start {
            if let Ok(decision) = serde_json::from_str::<RawDecision>(&content[start..end]) {
                return Some(decision);
            }
        }
    }

    None
}
