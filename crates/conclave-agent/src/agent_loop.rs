use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use conclave_core::config::ModelConfig;
use conclave_core::error::{ConclaveError, Result};
use conclave_core::event::EventBus;
use conclave_core::traits::LlmClient;
use conclave_core::types::*;
use conclave_llm::{collect_reply, ModelReply};
use conclave_tools::ActionDispatcher;

use crate::conversation::ConversationState;
use crate::directive::{parse_action_line, strip_answer_prefix};

/// Default iteration cap of the single-agent loop.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

const REACT_PROMPT: &str = "\
You run in a loop of Thought, Action, Pause, Observation.
At the end of the loop you output an Answer.
Use Thought to describe your thoughts about the question you have been asked.
Use Action to run one of the actions available to you - then return Pause.
Observation will be the result of running those actions.

Your available actions are:
{actions}
Example session:
Question: How many islands make up Madeira?
Thought: I should do a web search for Madeira
Action: web_search: Madeira
Pause

You will be called again with this:
Observation: Madeira is a Portuguese island chain made up of four islands: Madeira, Porto Santo, Desertas, and Selvagens.

You then output:
Answer: Four islands
";

/// Build the ReAct system prompt listing the dispatcher's tools.
pub fn react_system_prompt(tools: &[ToolDefinition]) -> String {
    let actions: String = tools
        .iter()
        .map(|t| format!("{}:\n{}\n\n", t.name, t.description))
        .collect();
    REACT_PROMPT.replace("{actions}", &actions)
}

/// Call the model once and collect the full reply, racing the cancel token.
pub async fn call_model(
    llm: &dyn LlmClient,
    model: &ModelConfig,
    messages: Vec<ChatMessage>,
    tools: &[ToolDefinition],
    cancel: &CancellationToken,
) -> Result<ModelReply> {
    tokio::select! {
        _ = cancel.cancelled() => Err(ConclaveError::Cancelled),
        reply = async {
            let stream = llm.chat_stream(model, messages, tools).await?;
            collect_reply(stream).await
        } => reply,
    }
}

/// One-shot question to the model: no system prompt, no tools.
pub async fn ask(
    llm: &dyn LlmClient,
    model: &ModelConfig,
    question: &str,
    cancel: &CancellationToken,
) -> Result<String> {
    let messages = vec![ChatMessage::user(question)];
    let reply = call_model(llm, model, messages, &[], cancel).await?;
    debug!(chars = reply.text.len(), "Direct answer received");
    Ok(reply.text.trim().to_string())
}

/// Result of one single-agent run.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Final answer, or the last model reply when the cap was hit.
    pub answer: String,
    /// Model calls made.
    pub iterations: usize,
    /// Whether the iteration cap ended the run.
    pub capped: bool,
    pub conversation: ConversationState,
}

/// A ReAct loop over the textual action protocol.
///
/// Each iteration calls the model with the whole conversation. A reply with an
/// `Action: <name>: <input>` line is dispatched and its observation appended;
/// a reply without one is the answer.
pub struct SingleAgentLoop {
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
    dispatcher: ActionDispatcher,
    system_prompt: Option<String>,
    max_iterations: usize,
    events: Option<Arc<EventBus>>,
    working_dir: std::path::PathBuf,
    cancel: CancellationToken,
}

impl SingleAgentLoop {
    pub fn new(llm: Arc<dyn LlmClient>, model: ModelConfig, dispatcher: ActionDispatcher) -> Self {
        Self {
            llm,
            model,
            dispatcher,
            system_prompt: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            events: None,
            working_dir: std::path::PathBuf::from("."),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the builtin ReAct prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the iteration cap (at least 1).
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n.max(1);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Get a cancellation token for this loop.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn publish(&self, event: AgentEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    /// Run the loop for one question.
    pub async fn run(&self, question: &str) -> Result<AgentOutcome> {
        let prompt = self
            .system_prompt
            .clone()
            .unwrap_or_else(|| react_system_prompt(&self.dispatcher.definitions()));
        let mut conversation = ConversationState::seeded(&prompt, question);

        let mut ctx = ToolContext::new(RunId::new(), &self.working_dir).for_agent("agent");
        ctx.cancel = self.cancel.clone();

        let mut last_reply = String::new();

        for iteration in 1..=self.max_iterations {
            if self.cancel.is_cancelled() {
                return Err(ConclaveError::Cancelled);
            }

            debug!(iteration, "Calling model");
            let reply = call_model(
                &*self.llm,
                &self.model,
                conversation.messages().to_vec(),
                &[],
                &self.cancel,
            )
            .await?;

            conversation.push(ChatMessage::assistant_text(reply.text.clone()));
            self.publish(AgentEvent::TurnComplete {
                agent: "agent".into(),
                turn: iteration,
            });

            let Some(action) = parse_action_line(&reply.text) else {
                info!(iterations = iteration, "Agent answered");
                return Ok(AgentOutcome {
                    answer: strip_answer_prefix(&reply.text),
                    iterations: iteration,
                    capped: false,
                    conversation,
                });
            };

            info!(action = %action.name, input = %action.input, "Running action");
            let observation = self
                .dispatcher
                .dispatch_text(&action.name, &action.input, &ctx)
                .await;
            conversation.push(ChatMessage::tool_text(format!(
                "Observation: {}",
                observation.text
            )));
            last_reply = reply.text;
        }

        warn!(max_iterations = self.max_iterations, "Iteration cap reached");
        Ok(AgentOutcome {
            answer: last_reply,
            iterations: self.max_iterations,
            capped: true,
            conversation,
        })
    }
}
