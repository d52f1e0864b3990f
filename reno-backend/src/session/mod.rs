//! The orchestration core: a bounded step machine that drives one capability
//! agent at a time, alternating between model generation and tool execution
//! until the agent finishes, the step budget runs out, or the session fails.
//!
//! States: Routing → AgentGenerating → ToolPending → ToolExecuting →
//! AgentGenerating (loop) → Terminal(Success | BudgetExceeded | Error).
//! Tool-level errors are fed back to the agent as data; only policy
//! violations and capability failures abort the session.

pub mod events;
pub mod ledger;
pub mod tracker;

pub use events::{create_event_channel, EventReceiver, EventSender, SessionEvent};
pub use ledger::{InteractionLedger, LedgerEntry};
pub use tracker::SessionTracker;

use crate::agents::{AgentSet, CapabilityAgent};
use crate::ai::types::{ToolHistoryEntry, ToolResponse};
use crate::ai::{Inference, Message, ModelEvent, TurnAccumulator};
use crate::datasets::ReferenceData;
use crate::gateway::protocol::GatewayEvent;
use crate::gateway::EventBroadcaster;
use crate::router::Router;
use crate::tools::{ToolContext, ToolError, ToolRegistry};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Session-fatal error taxonomy. Tool-level errors never appear here; they
/// are reported back into the conversation as tool-result errors instead.
#[derive(Debug, Clone)]
pub enum SessionError {
    /// An agent requested an unbound tool, or the router selected a
    /// nonexistent agent
    PolicyViolation(String),
    /// The inference capability is unreachable or returned an unusable
    /// stream
    CapabilityUnavailable(String),
    /// The step counter overflowed the configured maximum, expected and
    /// graceful, not a bug
    BudgetExceeded { steps: u32 },
}

impl SessionError {
    pub fn terminal_state(&self) -> TerminalState {
        match self {
            SessionError::BudgetExceeded { .. } => TerminalState::BudgetExceeded,
            _ => TerminalState::Error,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::PolicyViolation(message) => write!(f, "policy violation: {}", message),
            SessionError::CapabilityUnavailable(message) => {
                write!(f, "inference capability unavailable: {}", message)
            }
            SessionError::BudgetExceeded { steps } => {
                write!(f, "step budget exceeded after {} steps", steps)
            }
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TerminalState {
    Success,
    BudgetExceeded,
    Error,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum number of steps (agent generation turns plus tool rounds)
    /// per session
    pub max_steps: u32,
    /// Per-tool execution time bound
    pub tool_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            max_steps: 20,
            tool_timeout: Duration::from_secs(30),
        }
    }
}

enum RunOutcome {
    Completed,
    Cancelled,
}

struct RunCtx<'a> {
    session_id: Uuid,
    max_steps: u32,
    tx: &'a EventSender,
    ledger: &'a InteractionLedger,
    cancel: &'a CancellationToken,
}

/// Drives sessions end to end. All collaborators are injected at
/// construction; there are no global lookups.
pub struct Orchestrator {
    model: Arc<dyn Inference>,
    agents: Arc<AgentSet>,
    registry: Arc<ToolRegistry>,
    router: Router,
    broadcaster: Arc<EventBroadcaster>,
    tracker: Arc<SessionTracker>,
    tool_context: ToolContext,
    config: SessionConfig,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn Inference>,
        agents: Arc<AgentSet>,
        registry: Arc<ToolRegistry>,
        data: Arc<ReferenceData>,
        broadcaster: Arc<EventBroadcaster>,
        tracker: Arc<SessionTracker>,
        config: SessionConfig,
    ) -> Result<Self, String> {
        // Misconfiguration is rejected here instead of surfacing mid-session
        if agents.is_empty() {
            return Err("Agent set must not be empty".to_string());
        }
        agents.validate_bindings(&registry)?;

        Ok(Orchestrator {
            router: Router::new(model.clone()),
            model,
            agents,
            registry,
            broadcaster,
            tracker,
            tool_context: ToolContext::new(data),
            config,
        })
    }

    pub fn tracker(&self) -> Arc<SessionTracker> {
        self.tracker.clone()
    }

    /// Start a session for `request`. Returns the session id and the
    /// caller-facing event stream; the loop itself runs on a spawned task.
    /// `max_steps` overrides the configured step budget for this session.
    pub fn start_session(
        self: Arc<Self>,
        request: String,
        max_steps: Option<u32>,
    ) -> (Uuid, EventReceiver) {
        let session_id = Uuid::new_v4();
        let max_steps = max_steps.unwrap_or(self.config.max_steps);
        let (tx, rx) = create_event_channel();
        let ledger = Arc::new(InteractionLedger::new());
        let cancel = CancellationToken::new();

        self.tracker
            .register(session_id, &request, ledger.clone(), cancel.clone());
        self.broadcaster
            .broadcast(GatewayEvent::session_started(session_id, &request));
        log::info!("[SESSION] {} started: {}", session_id, request);

        let orchestrator = self.clone();
        tokio::spawn(async move {
            let ctx = RunCtx {
                session_id,
                max_steps,
                tx: &tx,
                ledger: &ledger,
                cancel: &cancel,
            };
            let terminal = orchestrator.run(&ctx, &request).await;
            orchestrator.tracker.complete(&session_id, terminal);
            orchestrator
                .broadcaster
                .broadcast(GatewayEvent::session_completed(session_id, terminal));
            log::info!("[SESSION] {} finished: {}", session_id, terminal);
        });

        (session_id, rx)
    }

    async fn run(&self, ctx: &RunCtx<'_>, request: &str) -> TerminalState {
        let assignments = match self.router.route(request, &self.agents).await {
            Ok(assignments) => assignments,
            Err(err) => {
                log::error!("[SESSION] {} routing failed: {}", ctx.session_id, err);
                self.emit(
                    ctx,
                    "router",
                    SessionEvent::Error {
                        message: err.to_string(),
                    },
                )
                .await;
                return err.terminal_state();
            }
        };

        // Routing decisions are audit data, not caller-facing output
        for assignment in &assignments {
            ctx.ledger.append(
                "router",
                SessionEvent::TextDelta {
                    content: format!("assigned {} <- {}", assignment.agent, assignment.request),
                },
            );
        }

        // The step budget is shared across the whole session
        let mut steps: u32 = 0;
        let mut sibling_failures = 0usize;

        for assignment in &assignments {
            if ctx.cancel.is_cancelled() {
                self.record_cancellation(ctx, &assignment.agent).await;
                return TerminalState::Cancelled;
            }

            // Validated by the router, so this lookup cannot fail
            let agent = self.agents.get(&assignment.agent).unwrap();

            match self.run_agent(ctx, agent, &assignment.request, &mut steps).await {
                Ok(RunOutcome::Completed) => {}
                Ok(RunOutcome::Cancelled) => return TerminalState::Cancelled,
                Err(err @ SessionError::BudgetExceeded { .. }) => {
                    // The budget is session-wide; siblings cannot run either
                    return err.terminal_state();
                }
                Err(err @ SessionError::PolicyViolation(_)) => {
                    // A policy violation means broken configuration, not a
                    // transient fault: abort the whole session
                    return err.terminal_state();
                }
                Err(SessionError::CapabilityUnavailable(message)) => {
                    // Recorded and surfaced, but an independent sibling run
                    // still gets its chance
                    log::error!(
                        "[SESSION] {} agent '{}' failed: {}",
                        ctx.session_id,
                        agent.name,
                        message
                    );
                    sibling_failures += 1;
                }
            }
        }

        if sibling_failures > 0 {
            TerminalState::Error
        } else {
            TerminalState::Success
        }
    }

    /// Run the generate/execute loop for one agent. `steps` is the
    /// session-wide counter; it increments on every generation turn and
    /// every tool-call/tool-result pair and never decreases.
    async fn run_agent(
        &self,
        ctx: &RunCtx<'_>,
        agent: &CapabilityAgent,
        request: &str,
        steps: &mut u32,
    ) -> Result<RunOutcome, SessionError> {
        let tools = self.registry.definitions_for(&agent.tools);
        let messages = vec![
            Message::system(agent.instructions.clone()),
            Message::user(request.to_string()),
        ];
        let mut tool_history: Vec<ToolHistoryEntry> = vec![];

        loop {
            if ctx.cancel.is_cancelled() {
                self.record_cancellation(ctx, &agent.name).await;
                return Ok(RunOutcome::Cancelled);
            }

            *steps += 1;
            if *steps > ctx.max_steps {
                return Err(self.budget_exhausted(ctx, agent, *steps).await);
            }

            let mut stream = match self
                .model
                .generate(messages.clone(), tool_history.clone(), tools.clone())
                .await
            {
                Ok(stream) => stream,
                Err(e) => {
                    let err = SessionError::CapabilityUnavailable(e.to_string());
                    self.emit(
                        ctx,
                        &agent.name,
                        SessionEvent::Error {
                            message: err.to_string(),
                        },
                    )
                    .await;
                    return Err(err);
                }
            };

            // AgentGenerating: relay the model stream while rebuilding the
            // turn. A tool-use intent suspends generation until the tool
            // round below supplies its result.
            let mut acc = TurnAccumulator::new();
            while let Some(event) = stream.recv().await {
                if ctx.cancel.is_cancelled() {
                    self.record_cancellation(ctx, &agent.name).await;
                    return Ok(RunOutcome::Cancelled);
                }
                match &event {
                    ModelEvent::ContentDelta { content } => {
                        self.emit(
                            ctx,
                            &agent.name,
                            SessionEvent::TextDelta {
                                content: content.clone(),
                            },
                        )
                        .await;
                    }
                    ModelEvent::ToolUse { id, name, arguments } => {
                        self.emit(
                            ctx,
                            &agent.name,
                            SessionEvent::ToolCall {
                                id: id.clone(),
                                tool: name.clone(),
                                arguments: arguments.clone(),
                            },
                        )
                        .await;
                    }
                    ModelEvent::Done { .. } | ModelEvent::Error { .. } => {}
                }
                acc.process_event(&event);
            }

            if let Some(message) = acc.error.take() {
                let err = SessionError::CapabilityUnavailable(format!(
                    "model stream failed: {}",
                    message
                ));
                self.emit(
                    ctx,
                    &agent.name,
                    SessionEvent::Error {
                        message: err.to_string(),
                    },
                )
                .await;
                return Err(err);
            }

            // Terminal(Success) for this agent: generation ended without a
            // further tool request
            if !acc.wants_tools() {
                return Ok(RunOutcome::Completed);
            }

            // ToolPending → ToolExecuting
            let mut responses: Vec<ToolResponse> = Vec::with_capacity(acc.tool_calls.len());
            for call in &acc.tool_calls {
                if !agent.is_bound(&call.name) || !self.registry.has_tool(&call.name) {
                    let err = SessionError::PolicyViolation(format!(
                        "Agent '{}' requested unbound tool '{}'",
                        agent.name, call.name
                    ));
                    self.emit(
                        ctx,
                        &agent.name,
                        SessionEvent::Error {
                            message: err.to_string(),
                        },
                    )
                    .await;
                    return Err(err);
                }

                *steps += 1;
                if *steps > ctx.max_steps {
                    // The attempted call is already on the stream and in the
                    // ledger; the budget error reports why it has no result
                    return Err(self.budget_exhausted(ctx, agent, *steps).await);
                }

                let result = match tokio::time::timeout(
                    self.config.tool_timeout,
                    self.registry
                        .execute(&call.name, call.arguments.clone(), &self.tool_context),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ToolError::execution(format!(
                        "tool '{}' timed out after {:?}",
                        call.name, self.config.tool_timeout
                    ))),
                };

                match result {
                    Ok(output) => {
                        self.emit(
                            ctx,
                            &agent.name,
                            SessionEvent::ToolResult {
                                id: call.id.clone(),
                                tool: call.name.clone(),
                                output: Some(output.clone()),
                                error: None,
                            },
                        )
                        .await;
                        responses.push(ToolResponse::success(call.id.clone(), output.to_string()));
                    }
                    Err(tool_err) => {
                        // Recoverable: the agent sees the failure as data
                        // and can explain it to the user
                        log::warn!(
                            "[SESSION] {} tool '{}' failed: {}",
                            ctx.session_id,
                            call.name,
                            tool_err
                        );
                        self.emit(
                            ctx,
                            &agent.name,
                            SessionEvent::ToolResult {
                                id: call.id.clone(),
                                tool: call.name.clone(),
                                output: None,
                                error: Some(tool_err.to_string()),
                            },
                        )
                        .await;
                        responses
                            .push(ToolResponse::error(call.id.clone(), tool_err.to_string()));
                    }
                }
            }

            tool_history.push(ToolHistoryEntry::new(acc.tool_calls.clone(), responses));
        }
    }

    async fn budget_exhausted(
        &self,
        ctx: &RunCtx<'_>,
        agent: &CapabilityAgent,
        steps: u32,
    ) -> SessionError {
        let err = SessionError::BudgetExceeded { steps };
        log::warn!(
            "[SESSION] {} exceeded step budget ({}), stopping to prevent runaway execution",
            ctx.session_id,
            ctx.max_steps
        );
        self.emit(
            ctx,
            &agent.name,
            SessionEvent::Error {
                message: format!(
                    "{}; stopping to prevent runaway execution",
                    err
                ),
            },
        )
        .await;
        err
    }

    async fn record_cancellation(&self, ctx: &RunCtx<'_>, agent: &str) {
        log::info!("[SESSION] {} cancelled by caller", ctx.session_id);
        // The explicit marker guarantees no tool call is left dangling
        // unexplained in the audit trail
        self.emit(
            ctx,
            agent,
            SessionEvent::Error {
                message: "session cancelled by caller".to_string(),
            },
        )
        .await;
    }

    /// Deliver an event to the caller stream, the ledger, and the gateway
    /// broadcaster. A dropped caller stream cancels the session: there is
    /// nobody left to stream to.
    async fn emit(&self, ctx: &RunCtx<'_>, agent: &str, event: SessionEvent) {
        ctx.ledger.append(agent, event.clone());
        self.broadcaster
            .broadcast(GatewayEvent::session_event(ctx.session_id, agent, &event));
        if ctx.tx.send(event).await.is_err() {
            ctx.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::create_default_agents;
    use crate::ai::streaming::create_model_stream;
    use crate::ai::types::AiError;
    use crate::ai::ModelStream;
    use crate::tools::builtin::create_default_registry;
    use crate::tools::ToolDefinition;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Model that replays one scripted event sequence per generation call,
    /// with a short pause between events so cancellation mid-stream is
    /// observable.
    struct ScriptedModel {
        turns: Mutex<VecDeque<Vec<ModelEvent>>>,
        event_delay: Duration,
    }

    impl ScriptedModel {
        fn new(turns: Vec<Vec<ModelEvent>>) -> Self {
            ScriptedModel {
                turns: Mutex::new(turns.into()),
                event_delay: Duration::ZERO,
            }
        }

        fn with_delay(turns: Vec<Vec<ModelEvent>>, event_delay: Duration) -> Self {
            ScriptedModel {
                turns: Mutex::new(turns.into()),
                event_delay,
            }
        }
    }

    #[async_trait]
    impl Inference for ScriptedModel {
        async fn generate(
            &self,
            _messages: Vec<Message>,
            _tool_history: Vec<ToolHistoryEntry>,
            _tools: Vec<ToolDefinition>,
        ) -> Result<ModelStream, AiError> {
            let turn = self.turns.lock().pop_front().unwrap_or_else(|| {
                vec![ModelEvent::Done {
                    stop_reason: Some("stop".to_string()),
                }]
            });
            let delay = self.event_delay;
            let (tx, rx) = create_model_stream();
            tokio::spawn(async move {
                for event in turn {
                    if delay > Duration::ZERO {
                        tokio::time::sleep(delay).await;
                    }
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            });
            Ok(rx)
        }
    }

    fn text_turn(text: &str) -> Vec<ModelEvent> {
        vec![
            ModelEvent::ContentDelta {
                content: text.to_string(),
            },
            ModelEvent::Done {
                stop_reason: Some("stop".to_string()),
            },
        ]
    }

    fn router_turn(json_decision: &str) -> Vec<ModelEvent> {
        text_turn(json_decision)
    }

    fn tool_turn(id: &str, name: &str, arguments: serde_json::Value) -> Vec<ModelEvent> {
        vec![
            ModelEvent::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                arguments,
            },
            ModelEvent::Done {
                stop_reason: Some("tool_calls".to_string()),
            },
        ]
    }

    fn build_orchestrator(model: ScriptedModel, max_steps: u32) -> Arc<Orchestrator> {
        Arc::new(
            Orchestrator::new(
                Arc::new(model),
                Arc::new(create_default_agents()),
                Arc::new(create_default_registry()),
                Arc::new(ReferenceData::empty()),
                Arc::new(EventBroadcaster::new()),
                Arc::new(SessionTracker::new()),
                SessionConfig {
                    max_steps,
                    ..Default::default()
                },
            )
            .unwrap(),
        )
    }

    async fn collect(mut rx: EventReceiver) -> Vec<SessionEvent> {
        let mut events = vec![];
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    /// Every tool_call must be followed by at most one matching tool_result
    /// before any other result for the same id.
    fn assert_call_result_pairing(events: &[SessionEvent]) {
        let mut open: Vec<String> = vec![];
        let mut resolved: Vec<String> = vec![];
        for event in events {
            match event {
                SessionEvent::ToolCall { id, .. } => {
                    assert!(!open.contains(id) && !resolved.contains(id), "duplicate call {}", id);
                    open.push(id.clone());
                }
                SessionEvent::ToolResult { id, .. } => {
                    assert!(open.contains(id), "result {} without open call", id);
                    open.retain(|o| o != id);
                    resolved.push(id.clone());
                }
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn routed_text_session_succeeds() {
        let model = ScriptedModel::new(vec![
            router_turn(r#"{"assignments": [{"agent": "knowledge", "request": "装修流程"}]}"#),
            vec![
                ModelEvent::ContentDelta {
                    content: "装修一般分为".to_string(),
                },
                ModelEvent::ContentDelta {
                    content: "七个阶段。".to_string(),
                },
                ModelEvent::Done {
                    stop_reason: Some("stop".to_string()),
                },
            ],
        ]);
        let orchestrator = build_orchestrator(model, 20);
        let (id, rx) = orchestrator.clone().start_session("装修流程是什么".to_string(), None);
        let events = collect(rx).await;

        let text: String = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::TextDelta { content } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "装修一般分为七个阶段。");

        let tracked = orchestrator.tracker().get(&id).unwrap();
        assert_eq!(tracked.terminal(), Some(TerminalState::Success));
        // Routing decision is in the audit trail
        let ledger = tracked.ledger.snapshot();
        assert!(ledger.iter().any(|e| e.agent == "router"));
    }

    #[tokio::test]
    async fn tool_round_feeds_result_back_to_agent() {
        let model = ScriptedModel::new(vec![
            router_turn(r#"{"assignments": [{"agent": "web_search"}]}"#),
            tool_turn("call_1", "search_web", json!({"query": "甲醛", "limit": 2})),
            text_turn("去除甲醛最有效的方法是通风。"),
        ]);
        let orchestrator = build_orchestrator(model, 20);
        let (id, rx) = orchestrator.clone().start_session("怎么除甲醛".to_string(), None);
        let events = collect(rx).await;

        assert_call_result_pairing(&events);
        let call_index = events
            .iter()
            .position(|e| matches!(e, SessionEvent::ToolCall { .. }))
            .unwrap();
        let result_index = events
            .iter()
            .position(|e| matches!(e, SessionEvent::ToolResult { .. }))
            .unwrap();
        assert!(call_index < result_index);
        match &events[result_index] {
            SessionEvent::ToolResult { output, error, .. } => {
                assert!(error.is_none());
                assert!(output.is_some());
            }
            _ => unreachable!(),
        }

        let tracked = orchestrator.tracker().get(&id).unwrap();
        assert_eq!(tracked.terminal(), Some(TerminalState::Success));
    }

    #[tokio::test]
    async fn invalid_tool_arguments_are_recoverable() {
        let model = ScriptedModel::new(vec![
            router_turn(r#"{"assignments": [{"agent": "budget_calculation"}]}"#),
            // room_size missing: the registry rejects this with a
            // validation error naming the field
            tool_turn(
                "call_1",
                "calculate_renovation_budget",
                json!({"location": "北京"}),
            ),
            text_turn("请补充房间面积等信息。"),
        ]);
        let orchestrator = build_orchestrator(model, 20);
        let (id, rx) = orchestrator.clone().start_session("帮我算预算".to_string(), None);
        let events = collect(rx).await;

        assert_call_result_pairing(&events);
        let error_result = events.iter().find_map(|e| match e {
            SessionEvent::ToolResult { error: Some(error), .. } => Some(error.clone()),
            _ => None,
        });
        let error_result = error_result.expect("expected a tool-result error");
        assert!(error_result.contains("room_size"));

        // The loop continued: the agent produced final text and the session
        // succeeded
        assert!(events.iter().any(
            |e| matches!(e, SessionEvent::TextDelta { content } if content.contains("补充"))
        ));
        let tracked = orchestrator.tracker().get(&id).unwrap();
        assert_eq!(tracked.terminal(), Some(TerminalState::Success));
    }

    #[tokio::test]
    async fn budget_of_one_forces_budget_exceeded() {
        // The agent always requests a tool call; with max_steps = 1 the
        // generation turn is step 1 and the attempted tool round overflows
        let model = ScriptedModel::new(vec![
            router_turn(r#"{"assignments": [{"agent": "web_search"}]}"#),
            tool_turn("call_1", "search_web", json!({"query": "趋势"})),
            tool_turn("call_2", "search_web", json!({"query": "趋势"})),
        ]);
        let orchestrator = build_orchestrator(model, 1);
        let (id, rx) = orchestrator.clone().start_session("最新趋势".to_string(), None);
        let events = collect(rx).await;

        // The attempted call is on the stream, but no result ever follows
        assert!(events.iter().any(|e| matches!(e, SessionEvent::ToolCall { .. })));
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::ToolResult { .. })));
        match events.last().unwrap() {
            SessionEvent::Error { message } => {
                assert!(message.contains("step budget exceeded"));
            }
            other => panic!("expected terminal error event, got {:?}", other),
        }

        let tracked = orchestrator.tracker().get(&id).unwrap();
        assert_eq!(tracked.terminal(), Some(TerminalState::BudgetExceeded));
        // The attempted call is recorded in the ledger
        assert!(tracked
            .ledger
            .snapshot()
            .iter()
            .any(|e| matches!(e.event, SessionEvent::ToolCall { .. })));
    }

    #[tokio::test]
    async fn generation_turns_are_bounded_by_max_steps() {
        // max_steps = 2: generation (1) + tool round (2) succeed, the next
        // generation turn would be step 3 and is refused
        let model = ScriptedModel::new(vec![
            router_turn(r#"{"assignments": [{"agent": "web_search"}]}"#),
            tool_turn("call_1", "search_web", json!({"query": "趋势"})),
            tool_turn("call_2", "search_web", json!({"query": "更多"})),
        ]);
        let orchestrator = build_orchestrator(model, 2);
        let (id, rx) = orchestrator.clone().start_session("最新趋势".to_string(), None);
        let events = collect(rx).await;

        assert_call_result_pairing(&events);
        // Exactly one completed tool round
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, SessionEvent::ToolResult { .. }))
                .count(),
            1
        );
        let tracked = orchestrator.tracker().get(&id).unwrap();
        assert_eq!(tracked.terminal(), Some(TerminalState::BudgetExceeded));
    }

    #[tokio::test]
    async fn unbound_tool_request_is_session_fatal() {
        let model = ScriptedModel::new(vec![
            router_turn(r#"{"assignments": [{"agent": "knowledge"}]}"#),
            // knowledge is not bound to the budget calculator
            tool_turn(
                "call_1",
                "calculate_renovation_budget",
                json!({"room_size": 90}),
            ),
        ]);
        let orchestrator = build_orchestrator(model, 20);
        let (id, rx) = orchestrator.clone().start_session("算一下预算".to_string(), None);
        let events = collect(rx).await;

        match events.last().unwrap() {
            SessionEvent::Error { message } => {
                assert!(message.contains("policy violation"));
                assert!(message.contains("calculate_renovation_budget"));
            }
            other => panic!("expected policy violation, got {:?}", other),
        }
        let tracked = orchestrator.tracker().get(&id).unwrap();
        assert_eq!(tracked.terminal(), Some(TerminalState::Error));
    }

    #[tokio::test]
    async fn unparseable_routing_falls_back_to_knowledge_agent() {
        let model = ScriptedModel::new(vec![
            router_turn("嗯……这个问题不太好说。"),
            text_turn("装修前建议先做好预算规划。"),
        ]);
        let orchestrator = build_orchestrator(model, 20);
        let (id, rx) = orchestrator.clone().start_session("给点装修建议".to_string(), None);
        let events = collect(rx).await;

        // The session still produced output instead of silently failing
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::TextDelta { .. })));
        let tracked = orchestrator.tracker().get(&id).unwrap();
        assert_eq!(tracked.terminal(), Some(TerminalState::Success));
        assert!(tracked
            .ledger
            .snapshot()
            .iter()
            .any(|e| e.agent == "router"
                && matches!(&e.event, SessionEvent::TextDelta { content } if content.contains("knowledge"))));
    }

    #[tokio::test]
    async fn sibling_agent_survives_capability_failure() {
        let model = ScriptedModel::new(vec![
            router_turn(
                r#"{"assignments": [
                    {"agent": "web_search", "request": "最新趋势"},
                    {"agent": "knowledge", "request": "装修流程"}
                ]}"#,
            ),
            vec![ModelEvent::Error {
                message: "connection reset".to_string(),
            }],
            text_turn("装修一般分为七个阶段。"),
        ]);
        let orchestrator = build_orchestrator(model, 20);
        let (id, rx) = orchestrator.clone().start_session("趋势和流程".to_string(), None);
        let events = collect(rx).await;

        // The first agent's failure is surfaced...
        assert!(events.iter().any(
            |e| matches!(e, SessionEvent::Error { message } if message.contains("connection reset"))
        ));
        // ...and the sibling still produced its output
        assert!(events.iter().any(
            |e| matches!(e, SessionEvent::TextDelta { content } if content.contains("七个阶段"))
        ));
        let tracked = orchestrator.tracker().get(&id).unwrap();
        assert_eq!(tracked.terminal(), Some(TerminalState::Error));
    }

    #[tokio::test]
    async fn cancellation_stops_delivery_and_marks_the_ledger() {
        let long_turn: Vec<ModelEvent> = (0..200)
            .map(|i| ModelEvent::ContentDelta {
                content: format!("片段{} ", i),
            })
            .chain(std::iter::once(ModelEvent::Done {
                stop_reason: Some("stop".to_string()),
            }))
            .collect();
        let model = ScriptedModel::with_delay(
            vec![
                router_turn(r#"{"assignments": [{"agent": "knowledge"}]}"#),
                long_turn,
            ],
            Duration::from_millis(2),
        );
        let orchestrator = build_orchestrator(model, 20);
        let (id, mut rx) = orchestrator.clone().start_session("讲讲装修".to_string(), None);

        // Wait for the first delta, then cancel mid-stream
        let first = rx.recv().await.expect("expected at least one event");
        assert!(matches!(first, SessionEvent::TextDelta { .. }));
        assert!(orchestrator.tracker().cancel(&id));

        let mut remaining = vec![];
        while let Some(event) = rx.recv().await {
            remaining.push(event);
        }
        // Delivery stopped well before the 200 scripted deltas
        assert!(remaining.len() < 200);

        // Give the spawned task a moment to record its terminal state
        tokio::time::sleep(Duration::from_millis(50)).await;
        let tracked = orchestrator.tracker().get(&id).unwrap();
        assert_eq!(tracked.terminal(), Some(TerminalState::Cancelled));
        assert!(tracked.ledger.snapshot().iter().any(
            |e| matches!(&e.event, SessionEvent::Error { message } if message.contains("cancelled"))
        ));
    }
}
