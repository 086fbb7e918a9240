use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use conclave_agent::{AgentOutcome, StepResult, WorkflowResult};
use conclave_core::event::EventBus;
use conclave_core::types::{AgentEvent, ChatMessage, Role};

const CYAN: &str = "\x1b[96m";
const MAGENTA: &str = "\x1b[95m";
const BLUE: &str = "\x1b[94m";
const GREEN: &str = "\x1b[92m";
const RED: &str = "\x1b[91m";
const RESET: &str = "\x1b[0m";

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_string(),
    }
}

/// Print one progress event to stderr. Returns true once the run is complete.
fn print_event(event: AgentEvent) -> bool {
    match event {
        AgentEvent::HopStarted { step, agent } => {
            eprintln!("\n[step {}: {}]", step, agent);
        }
        AgentEvent::ToolStart { name, input, .. } => {
            eprintln!("[tool: {}] {}", name, truncate(&input.to_string(), 120));
        }
        AgentEvent::ToolEnd { name, result, .. } => {
            let status = if result.is_error { "ERROR" } else { "ok" };
            eprintln!("[{}: {}] {}", name, status, truncate(&result.content, 200));
        }
        AgentEvent::HopCompleted {
            agent, next_agent, ..
        } => {
            if next_agent.is_empty() {
                eprintln!("[{} ended the run]", agent);
            } else {
                eprintln!("[{} -> {}]", agent, next_agent);
            }
        }
        AgentEvent::RunError { error } => {
            eprintln!("[error: {}]", error);
        }
        AgentEvent::RunComplete { total_steps, .. } => {
            eprintln!("\n[done: {} steps]", total_steps);
            return true;
        }
        AgentEvent::RunStarted { .. } | AgentEvent::TurnComplete { .. } => {}
    }
    false
}

/// Print progress events to stderr until the run completes.
pub fn spawn_event_printer(events: &Arc<EventBus>) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if print_event(event) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    eprintln!("[{} progress events skipped]", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

pub fn print_workflow_start() {
    println!("\n{}Starting Report Generation Workflow{}", CYAN, RESET);
    println!("================================");
}

pub fn print_summary(result: &WorkflowResult) {
    println!("\n{}Workflow Summary{}", CYAN, RESET);
    println!("Run: {}", result.run_id);
    println!("Total Duration: {}ms", result.duration().num_milliseconds());
    println!("Total Steps: {}", result.total_steps());
    println!("Outcome: {}", result.termination);
    if let Some(error) = result.error() {
        println!("{}Error: {}{}", RED, error, RESET);
    }
}

fn print_outputs(output: &[ChatMessage]) {
    for msg in output {
        match msg.role {
            Role::User => println!("{}[User]{}: {}", GREEN, RESET, msg.text()),
            Role::Assistant => {
                let name = msg.name.as_deref().unwrap_or("Assistant");
                let mut text = msg.text();
                for (_, tool, input) in msg.tool_uses() {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&format!("-> {}({})", tool, input));
                }
                println!("{}[{}]{}: {}", BLUE, name, RESET, text);
            }
            Role::Tool => {
                let label = msg.name.as_deref().unwrap_or("Tool Result");
                println!("{}[{}]{}: {}", MAGENTA, label, RESET, msg.text());
            }
            Role::System => {}
        }
    }
}

pub fn print_step(step: &StepResult) {
    println!("\n{}Step {} Results:{}", MAGENTA, step.step_number, RESET);
    println!("Agent: {}", step.agent_name);
    println!("Duration: {}ms", step.duration().num_milliseconds());
    if let Some(error) = &step.error {
        println!("{}Error: {}{}", RED, error, RESET);
        return;
    }

    println!("Output:");
    print_outputs(&step.output);

    if !step.next_agent.is_empty() {
        println!("\nNext Agent: {}", step.next_agent);
    }
    println!("-----------------------------------------");
}

/// Full workflow report: summary, every step, then the answer.
pub fn print_workflow(result: &WorkflowResult) {
    print_summary(result);
    println!("\n{}Detailed Step Results{}", CYAN, RESET);
    for step in &result.steps {
        print_step(step);
    }
    if !result.final_answer.is_empty() {
        println!("\n{}Final Answer{}\n{}", CYAN, RESET, result.final_answer);
    }
}

/// Single-agent transcript: every message after the system prompt.
pub fn print_agent_outcome(outcome: &AgentOutcome) {
    print_outputs(outcome.conversation.messages());
    if outcome.capped {
        eprintln!(
            "[stopped after {} iterations without a final answer]",
            outcome.iterations
        );
    }
    println!("\nAnswer: {}", outcome.answer);
}
