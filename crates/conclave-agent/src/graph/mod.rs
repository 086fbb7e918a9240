//! Multi-agent workflows.
//!
//! Agents are nodes, grouped into teams. Directed edges say who may hand
//! control to whom. The `WorkflowExecutor` starts at a leader and moves
//! control one hop at a time, reading each agent's reply for a hand-off or a
//! finish, until the run finishes, fails, hits a cycle limit or runs out of
//! steps.

pub mod agent;
pub mod agent_graph;
pub mod cycle;
pub mod edge;
pub mod executor;
pub mod result;

pub use agent::{Agent, Team};
pub use agent_graph::AgentGraph;
pub use cycle::{ContinueOnCycle, CycleHandler, CycleState, MaxVisits, StopOnCycle};
pub use edge::Edge;
pub use executor::{WorkflowExecutor, DEFAULT_MAX_STEPS};
pub use result::{StepError, StepErrorKind, StepResult, Termination, WorkflowResult};
