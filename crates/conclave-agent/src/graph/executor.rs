use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use conclave_core::config::{AppConfig, ModelConfig};
use conclave_core::error::{ConclaveError, Result};
use conclave_core::event::EventBus;
use conclave_core::traits::LlmClient;
use conclave_core::types::*;
use conclave_tools::ActionDispatcher;

use super::agent::Agent;
use super::agent_graph::AgentGraph;
use super::cycle::{self, ContinueOnCycle, CycleHandler, CycleState};
use super::result::{StepError, StepResult, Termination, WorkflowResult};
use crate::agent_loop::{call_model, DEFAULT_MAX_ITERATIONS};
use crate::conversation::ConversationState;
use crate::directive::{parse_action_line, parse_free_text, parse_routing_call, routing_tools, Directive};

/// Default hop budget of a run.
pub const DEFAULT_MAX_STEPS: usize = 20;

/// Drives a run through an [`AgentGraph`].
///
/// Starting at the leader, each hop runs one agent's turn (including its own
/// tool calls), reads the hand-off or finish decision from the reply, checks
/// the edge and the cycle policy, and records a [`StepResult`]. Hops run one
/// at a time. Each agent keeps its own conversation across re-entries; the
/// only thing passed between agents is the hand-off message.
pub struct WorkflowExecutor {
    graph: AgentGraph,
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
    cycle_handler: Box<dyn CycleHandler>,
    max_steps: usize,
    max_turns: usize,
    working_dir: std::path::PathBuf,
    events: Option<Arc<EventBus>>,
    cancel: CancellationToken,
}

impl WorkflowExecutor {
    pub fn new(graph: AgentGraph, llm: Arc<dyn LlmClient>, model: ModelConfig) -> Self {
        Self {
            graph,
            llm,
            model,
            cycle_handler: Box::new(ContinueOnCycle),
            max_steps: DEFAULT_MAX_STEPS,
            max_turns: DEFAULT_MAX_ITERATIONS,
            working_dir: std::path::PathBuf::from("."),
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Executor for the `[workflow]` section: graph, step budget, cycle
    /// policy, turn cap and workspace all come from `config`.
    pub fn from_config(config: &AppConfig, graph: AgentGraph, llm: Arc<dyn LlmClient>) -> Self {
        let mut executor = Self::new(graph, llm, config.model.clone())
            .with_max_steps(config.workflow.max_steps)
            .with_max_turns(config.agent.max_turns)
            .with_working_dir(config.workspace_dir());
        executor.cycle_handler = cycle::from_config(&config.workflow.cycle_policy);
        executor
    }

    pub fn with_cycle_handler(mut self, handler: impl CycleHandler + 'static) -> Self {
        self.cycle_handler = Box::new(handler);
        self
    }

    /// Hop budget per run (at least 1).
    pub fn with_max_steps(mut self, steps: usize) -> Self {
        self.max_steps = steps.max(1);
        self
    }

    /// Default model calls per hop for agents without their own cap.
    pub fn with_max_turns(mut self, turns: usize) -> Self {
        self.max_turns = turns.max(1);
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Get a cancellation token for this executor.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn graph(&self) -> &AgentGraph {
        &self.graph
    }

    fn publish(&self, event: AgentEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    /// Run `request` starting at `leader`.
    ///
    /// Only an unknown leader is an error. Everything that goes wrong during
    /// the run is reported on the returned result.
    pub async fn execute(&self, leader: &str, request: &str) -> Result<WorkflowResult> {
        if self.graph.agent(leader).is_none() {
            return Err(ConclaveError::UnknownAgent(leader.to_string()));
        }

        let run_id = RunId::new();
        let start_time = Utc::now();
        let mut ctx = ToolContext::new(run_id.clone(), &self.working_dir);
        ctx.cancel = self.cancel.clone();

        info!(run_id = %run_id, leader, policy = self.cycle_handler.name(), "Workflow started");
        self.publish(AgentEvent::RunStarted {
            run_id: run_id.clone(),
            leader: leader.to_string(),
        });

        let mut conversations: HashMap<String, ConversationState> = HashMap::new();
        let mut cycle_state = CycleState::new();
        cycle_state.enter(leader);

        let mut steps: Vec<StepResult> = Vec::new();
        let mut current = leader.to_string();
        let mut handoff: Option<(String, String)> = None;
        let mut last_content = String::new();
        let mut final_answer: Option<String> = None;
        let mut termination = Termination::BudgetExhausted;
        let mut prev_end = start_time;

        for step_number in 1..=self.max_steps {
            if self.cancel.is_cancelled() {
                termination = Termination::Cancelled;
                break;
            }

            let hop_start = Utc::now().max(prev_end);
            let Some(agent) = self.graph.agent(&current) else {
                // Unreachable in practice: routes are validated before use.
                termination = Termination::Failed;
                break;
            };
            debug!(step = step_number, agent = %current, "Hop started");
            self.publish(AgentEvent::HopStarted {
                step: step_number,
                agent: current.clone(),
            });

            let conversation = conversations
                .entry(current.clone())
                .or_insert_with(|| ConversationState::seeded(&agent.instructions, request));
            let mark = conversation.len();
            if let Some((sender, message)) = handoff.take() {
                let text = if message.is_empty() {
                    format!("Hand-off from {}.", sender)
                } else {
                    message
                };
                conversation.push(ChatMessage::tool_text(text).named(sender));
            }

            let successors = self.graph.successors(&current);
            let turn = self
                .run_turn(agent, conversation, &successors, &ctx.for_agent(&current))
                .await;

            let mut step = StepResult {
                step_number,
                agent_name: current.clone(),
                start_time: hop_start,
                end_time: hop_start,
                output: conversation.since(mark).to_vec(),
                next_agent: String::new(),
                error: None,
            };
            let hop_text = conversation.last_assistant_text().unwrap_or_default();

            let next = match turn {
                Err(e) => {
                    error!(agent = %current, error = %e, "Hop failed");
                    termination = if matches!(e, ConclaveError::Cancelled) {
                        Termination::Cancelled
                    } else {
                        Termination::Failed
                    };
                    step.error = Some(StepError::from_error(&e));
                    if !hop_text.is_empty() {
                        last_content = hop_text;
                    }
                    None
                }
                Ok(Directive::Finish { answer }) => {
                    info!(agent = %current, step = step_number, "Workflow finished");
                    termination = Termination::Finished;
                    if !answer.is_empty() {
                        final_answer = Some(answer);
                    }
                    None
                }
                Ok(Directive::Handoff { to, message }) => {
                    step.next_agent = to.clone();
                    match self.admit(&current, &to, &mut cycle_state) {
                        Ok(()) => {
                            let content = if message.is_empty() { hop_text } else { message.clone() };
                            if !content.is_empty() {
                                last_content = content;
                            }
                            Some((to, message))
                        }
                        Err(e) => {
                            warn!(from = %current, to = %to, error = %e, "Hand-off refused");
                            termination = if matches!(e, ConclaveError::CycleDetected { .. }) {
                                Termination::CycleDetected
                            } else {
                                Termination::Failed
                            };
                            step.error = Some(StepError::from_error(&e));
                            None
                        }
                    }
                }
                // run_turn resolves tool calls itself.
                Ok(Directive::ToolCalls(_)) => None,
            };

            step.end_time = Utc::now().max(hop_start);
            prev_end = step.end_time;
            self.publish(AgentEvent::HopCompleted {
                step: step_number,
                agent: current.clone(),
                next_agent: step.next_agent.clone(),
            });
            if let Some(e) = &step.error {
                self.publish(AgentEvent::RunError {
                    error: e.message.clone(),
                });
            }
            steps.push(step);

            match next {
                Some((to, message)) => {
                    handoff = Some((current.clone(), message));
                    current = to;
                }
                None => break,
            }
        }

        if termination == Termination::BudgetExhausted {
            info!(max_steps = self.max_steps, "Step budget exhausted");
        }

        let result = WorkflowResult {
            run_id: run_id.clone(),
            start_time,
            end_time: Utc::now().max(prev_end),
            final_answer: final_answer.unwrap_or(last_content),
            steps,
            termination,
        };
        self.publish(AgentEvent::RunComplete {
            run_id,
            total_steps: result.steps.len(),
        });
        Ok(result)
    }

    /// Validate the edge, count the visit and apply the cycle policy.
    fn admit(&self, from: &str, to: &str, cycle_state: &mut CycleState) -> Result<()> {
        self.graph.validate_route(from, to)?;
        let visits = cycle_state.enter(to);
        self.cycle_handler.check(to, visits)
    }

    /// One agent's turn: call the model, run any tools it asks for, and repeat
    /// until it produces a routing decision or its turn cap is reached.
    async fn run_turn(
        &self,
        agent: &Agent,
        conversation: &mut ConversationState,
        successors: &[&str],
        ctx: &ToolContext,
    ) -> Result<Directive> {
        let model = match &agent.model {
            Some(id) => self.model.with_model_id(id),
            None => self.model.clone(),
        };
        let mut dispatcher = ActionDispatcher::new(agent.tools.clone());
        if let Some(events) = &self.events {
            dispatcher = dispatcher.with_events(events.clone());
        }
        let mut tools = agent.tools.definitions();
        tools.extend(routing_tools(successors));

        let max_turns = agent.max_turns.unwrap_or(self.max_turns);
        let mut last_text = String::new();

        for turn in 1..=max_turns {
            let reply = call_model(
                &*self.llm,
                &model,
                conversation.messages().to_vec(),
                &tools,
                &self.cancel,
            )
            .await?;
            conversation.push(reply.to_message().named(&agent.name));
            self.publish(AgentEvent::TurnComplete {
                agent: agent.name.clone(),
                turn,
            });

            let routing = reply.tool_calls.iter().find_map(parse_routing_call);
            let directive = match routing {
                Some(d) => Some(d),
                None if reply.has_tool_calls() => Some(Directive::ToolCalls(reply.tool_calls.clone())),
                None => None,
            };

            match directive {
                Some(Directive::ToolCalls(calls)) => {
                    for call in calls {
                        let observation = dispatcher.dispatch(&call.name, call.input, ctx).await;
                        conversation.push(ChatMessage::tool_result(
                            call.id,
                            observation.text,
                            !observation.success,
                        ));
                    }
                }
                Some(routing) => {
                    // Every call gets an answer so the history stays well formed.
                    for call in &reply.tool_calls {
                        let text = if parse_routing_call(call).is_some() {
                            "Acknowledged.".to_string()
                        } else {
                            "Skipped: control was handed off.".to_string()
                        };
                        conversation.push(ChatMessage::tool_result(call.id.clone(), text, false));
                    }
                    let routing = match routing {
                        Directive::Handoff { to, message } if message.is_empty() => {
                            Directive::Handoff {
                                to,
                                message: reply.text.trim().to_string(),
                            }
                        }
                        other => other,
                    };
                    return Ok(routing);
                }
                None => match parse_action_line(&reply.text)
                    .filter(|a| agent.tools.get(&a.name).is_some())
                {
                    Some(action) => {
                        let observation = dispatcher
                            .dispatch_text(&action.name, &action.input, ctx)
                            .await;
                        conversation.push(
                            ChatMessage::tool_text(format!("Observation: {}", observation.text))
                                .named(&action.name),
                        );
                    }
                    None => return Ok(parse_free_text(&reply.text, successors)),
                },
            }
            last_text = reply.text;
        }

        warn!(agent = %agent.name, max_turns, "Turn cap reached");
        Ok(parse_free_text(&last_text, successors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_test_utils::{test_model, RecordingTool, ScriptedLlm};
    use conclave_tools::ToolRegistry;
    use serde_json::json;

    use crate::graph::cycle::{MaxVisits, StopOnCycle};
    use crate::graph::result::StepErrorKind;

    /// supervisor <-> worker, nothing else.
    fn pair() -> AgentGraph {
        let mut graph = AgentGraph::new();
        graph
            .add_agent(Agent::new("supervisor", "Route work."), "supervisor")
            .unwrap();
        graph
            .add_agent(Agent::new("worker", "Do work."), "workers")
            .unwrap();
        graph.connect("supervisor", "worker").unwrap();
        graph.connect("worker", "supervisor").unwrap();
        graph
    }

    fn executor(graph: AgentGraph, llm: ScriptedLlm) -> WorkflowExecutor {
        WorkflowExecutor::new(graph, Arc::new(llm), test_model())
    }

    fn assert_well_formed(result: &WorkflowResult) {
        for (i, step) in result.steps.iter().enumerate() {
            assert_eq!(step.step_number, i + 1);
            assert!(step.end_time >= step.start_time);
            if i > 0 {
                assert!(step.start_time >= result.steps[i - 1].start_time);
                assert!(step.start_time >= result.steps[i - 1].end_time);
            }
        }
    }

    #[tokio::test]
    async fn ping_pong_under_continue() {
        // worker has a single edge, so its free-text reply goes back to supervisor.
        let llm = ScriptedLlm::new()
            .then_text("worker")
            .then_text("part one done")
            .then_text("worker")
            .then_text("part two done")
            .then_text("worker")
            .then_text("part three done")
            .then_text("FINISH");
        let result = executor(pair(), llm).execute("supervisor", "go").await.unwrap();

        assert_eq!(result.termination, Termination::Finished);
        assert_eq!(result.total_steps(), 7);
        let agents: Vec<_> = result.steps.iter().map(|s| s.agent_name.as_str()).collect();
        assert_eq!(
            agents,
            vec!["supervisor", "worker", "supervisor", "worker", "supervisor", "worker", "supervisor"]
        );
        assert!(result.steps.iter().all(|s| s.error.is_none()));
        assert_eq!(result.steps.last().unwrap().next_agent, "");
        // A bare FINISH leaves the last hand-off as the answer.
        assert_eq!(result.final_answer, "part three done");
        assert_well_formed(&result);
    }

    #[tokio::test]
    async fn stop_on_cycle_ends_at_first_revisit() {
        let llm = ScriptedLlm::new()
            .then_text("worker")
            .then_text("work is done")
            .then_text("worker");
        let result = executor(pair(), llm)
            .with_cycle_handler(StopOnCycle)
            .execute("supervisor", "go")
            .await
            .unwrap();

        assert_eq!(result.termination, Termination::CycleDetected);
        assert_eq!(result.total_steps(), 2);
        let last = result.steps.last().unwrap();
        assert_eq!(last.agent_name, "worker");
        assert_eq!(last.next_agent, "supervisor");
        let err = last.error.as_ref().unwrap();
        assert_eq!(err.kind, StepErrorKind::CycleDetected);
        assert!(err.message.contains("supervisor visited 2 times"));
    }

    #[tokio::test]
    async fn max_visits_counts_the_leader_start() {
        // With one edge each, every free-text reply is an implicit hand-off.
        let llm = ScriptedLlm::new()
            .then_text("worker")
            .otherwise_text("still working on it");
        let result = executor(pair(), llm)
            .with_cycle_handler(MaxVisits(2))
            .execute("supervisor", "go")
            .await
            .unwrap();
        // supervisor(1) -> worker(1) -> supervisor(2) -> worker(2) -> supervisor(3) refused.
        assert_eq!(result.termination, Termination::CycleDetected);
        assert_eq!(result.total_steps(), 4);
    }

    #[tokio::test]
    async fn budget_exhaustion_is_silent() {
        let llm = ScriptedLlm::new().otherwise_text("keep going");
        let result = executor(pair(), llm)
            .with_max_steps(3)
            .execute("supervisor", "go")
            .await
            .unwrap();
        assert_eq!(result.termination, Termination::BudgetExhausted);
        assert_eq!(result.total_steps(), 3);
        assert!(result.steps.iter().all(|s| s.error.is_none()));
        assert_eq!(result.final_answer, "keep going");
        assert_well_formed(&result);
    }

    #[tokio::test]
    async fn routing_error_is_recorded_and_terminal() {
        let llm = ScriptedLlm::new().then_text("Next: writer");
        let result = executor(pair(), llm).execute("supervisor", "go").await.unwrap();
        assert_eq!(result.termination, Termination::Failed);
        assert_eq!(result.total_steps(), 1);
        let err = result.error().unwrap();
        assert_eq!(err.kind, StepErrorKind::Routing);
        assert_eq!(err.message, "No route from supervisor to writer");
    }

    #[tokio::test]
    async fn next_finish_line_ends_the_run() {
        let llm = ScriptedLlm::new().then_text("All done.\nNext: FINISH");
        let result = executor(pair(), llm).execute("supervisor", "go").await.unwrap();
        assert_eq!(result.termination, Termination::Finished);
        assert_eq!(result.total_steps(), 1);
        assert_eq!(result.steps[0].next_agent, "");
        assert!(result.error().is_none());
        assert_eq!(result.final_answer, "All done.");
    }

    #[tokio::test]
    async fn handoff_call_to_finish_ends_the_run() {
        let llm = ScriptedLlm::new()
            .then_text("worker")
            .then_text("the numbers are in")
            .then_tool_call("handoff", json!({"agent": "FINISH"}));
        let result = executor(pair(), llm).execute("supervisor", "go").await.unwrap();
        assert_eq!(result.termination, Termination::Finished);
        assert_eq!(result.total_steps(), 3);
        let last = result.steps.last().unwrap();
        assert_eq!(last.next_agent, "");
        assert!(last.error.is_none());
        assert_eq!(result.final_answer, "the numbers are in");
    }

    #[tokio::test]
    async fn lowercase_finish_ends_the_run() {
        let llm = ScriptedLlm::new()
            .then_text("worker")
            .then_text("the numbers are in")
            .then_text("finish");
        let result = executor(pair(), llm).execute("supervisor", "go").await.unwrap();
        assert_eq!(result.termination, Termination::Finished);
        assert_eq!(result.total_steps(), 3);
        assert_eq!(result.steps.last().unwrap().next_agent, "");
        assert_eq!(result.final_answer, "the numbers are in");
    }

    #[tokio::test]
    async fn solo_agent_one_word_answer_finishes() {
        let mut graph = AgentGraph::new();
        graph
            .add_agent(Agent::new("geographer", "Answer briefly."), "solo")
            .unwrap();
        let llm = ScriptedLlm::new().then_text("Paris.");
        let result = executor(graph, llm)
            .execute("geographer", "Capital of France?")
            .await
            .unwrap();
        assert_eq!(result.termination, Termination::Finished);
        assert_eq!(result.total_steps(), 1);
        assert_eq!(result.steps[0].next_agent, "");
        assert_eq!(result.final_answer, "Paris.");
    }

    #[tokio::test]
    async fn closing_word_that_is_not_an_agent_finishes() {
        let mut graph = pair();
        graph
            .add_agent(Agent::new("writer", "Write."), "workers")
            .unwrap();
        graph.connect("supervisor", "writer").unwrap();
        let llm = ScriptedLlm::new().then_text("The report is complete.\n\nDone.");
        let result = executor(graph, llm).execute("supervisor", "go").await.unwrap();
        assert_eq!(result.termination, Termination::Finished);
        assert_eq!(result.total_steps(), 1);
        assert!(result.error().is_none());
        assert_eq!(result.final_answer, "The report is complete.\n\nDone.");
    }

    #[tokio::test]
    async fn model_failure_is_recorded_and_terminal() {
        let llm = ScriptedLlm::new()
            .then_text("worker")
            .then_error(ConclaveError::LlmRequest("HTTP 500: down".into()));
        let calls = llm.call_counter();
        let result = executor(pair(), llm).execute("supervisor", "go").await.unwrap();
        assert_eq!(result.termination, Termination::Failed);
        assert_eq!(result.total_steps(), 2);
        assert_eq!(result.error().unwrap().kind, StepErrorKind::ModelCall);
        // No retries at this layer.
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_leader_is_a_setup_error() {
        let err = executor(pair(), ScriptedLlm::new())
            .execute("ghost", "go")
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn tool_calls_stay_inside_the_hop() {
        let search = RecordingTool::new("web_search", "1. https://a").requiring("query");
        let inputs = search.inputs();
        let mut tools = ToolRegistry::new();
        tools.register(search);

        let mut graph = AgentGraph::new();
        graph
            .add_agent(Agent::new("supervisor", "Route."), "supervisor")
            .unwrap();
        graph
            .add_agent(Agent::new("scraper", "Search.").with_tools(tools), "research")
            .unwrap();
        graph.connect("supervisor", "scraper").unwrap();
        graph.connect("scraper", "supervisor").unwrap();

        let llm = ScriptedLlm::new()
            .then_tool_call("handoff", json!({"agent": "scraper", "message": "find news"}))
            .then_tool_call("web_search", json!({"query": "news"}))
            .then_tool_call("web_search", json!({"wrong": "field"}))
            .then_text("Found: https://a")
            .then_tool_call("finish", json!({"answer": "All done"}));
        let seen = llm.seen_messages();
        let seen_tools = llm.seen_tools();

        let result = executor(graph, llm).execute("supervisor", "report").await.unwrap();
        assert_eq!(result.termination, Termination::Finished);
        assert_eq!(result.total_steps(), 3);
        assert_eq!(result.final_answer, "All done");
        assert_eq!(inputs.lock().unwrap().len(), 1);

        // The scraper's hop holds the payload, both tool rounds, and the reply.
        let scraper_step = &result.steps[1];
        assert_eq!(scraper_step.next_agent, "supervisor");
        assert_eq!(scraper_step.output[0].text(), "find news");
        assert_eq!(scraper_step.output[0].name.as_deref(), Some("supervisor"));
        let failed = scraper_step
            .output
            .iter()
            .find(|m| m.text().starts_with("Error:"))
            .unwrap();
        assert_eq!(failed.text(), "Error: query parameter is required for web_search");

        // Context isolation: the scraper never sees the supervisor's history.
        let seen = seen.lock().unwrap();
        let scraper_first_call = &seen[1];
        assert_eq!(scraper_first_call[0].text(), "Search.");
        assert_eq!(scraper_first_call.len(), 3);

        // The scraper is offered its own tool plus routing tools.
        let seen_tools = seen_tools.lock().unwrap();
        assert_eq!(seen_tools[1], vec!["web_search", "handoff", "finish"]);
    }

    #[tokio::test]
    async fn reentry_resumes_own_context() {
        let llm = ScriptedLlm::new()
            .then_text("worker")
            .then_text("result A")
            .then_text("FINISH");
        let seen = llm.seen_messages();
        executor(pair(), llm).execute("supervisor", "go").await.unwrap();

        let seen = seen.lock().unwrap();
        let supervisor_again = &seen[2];
        // system, user, first reply, hand-off from worker
        assert_eq!(supervisor_again.len(), 4);
        assert_eq!(supervisor_again[2].text(), "worker");
        assert_eq!(supervisor_again[3].text(), "result A");
        assert_eq!(supervisor_again[3].name.as_deref(), Some("worker"));
    }

    #[tokio::test]
    async fn inner_turn_cap_is_independent_of_steps() {
        let busy = RecordingTool::new("bash", "ok");
        let mut tools = ToolRegistry::new();
        tools.register(busy);
        let mut graph = AgentGraph::new();
        graph
            .add_agent(
                Agent::new("solo", "Work.").with_tools(tools).with_max_turns(2),
                "default",
            )
            .unwrap();

        let llm = ScriptedLlm::new()
            .then_tool_call("bash", json!({"command": "ls"}))
            .then_tool_call("bash", json!({"command": "ls"}));
        let calls = llm.call_counter();
        let result = executor(graph, llm).execute("solo", "go").await.unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(result.total_steps(), 1);
        assert_eq!(result.termination, Termination::Finished);
    }

    #[tokio::test]
    async fn cancellation_yields_well_formed_result() {
        let exec = executor(pair(), ScriptedLlm::new().otherwise_text("worker"));
        exec.cancel_token().cancel();
        let result = exec.execute("supervisor", "go").await.unwrap();
        assert_eq!(result.termination, Termination::Cancelled);
        assert!(result.steps.is_empty());
    }

    #[tokio::test]
    async fn events_follow_the_hops() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let llm = ScriptedLlm::new().then_text("FINISH");
        executor(pair(), llm)
            .with_events(bus)
            .execute("supervisor", "go")
            .await
            .unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event {
                AgentEvent::RunStarted { .. } => "run_started",
                AgentEvent::HopStarted { .. } => "hop_started",
                AgentEvent::TurnComplete { .. } => "turn",
                AgentEvent::HopCompleted { .. } => "hop_completed",
                AgentEvent::RunComplete { .. } => "run_complete",
                _ => "other",
            });
        }
        assert_eq!(
            kinds,
            vec!["run_started", "hop_started", "turn", "hop_completed", "run_complete"]
        );
    }
}
