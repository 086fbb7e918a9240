pub mod agent_loop;
pub mod conversation;
pub mod directive;
pub mod graph;

pub use agent_loop::{ask, call_model, AgentOutcome, SingleAgentLoop};
pub use conversation::ConversationState;
pub use directive::Directive;
pub use graph::{
    Agent, AgentGraph, CycleHandler, StepResult, Team, Termination, WorkflowExecutor,
    WorkflowResult,
};
