use chrono::{DateTime, Utc};

use conclave_core::error::ConclaveError;
use conclave_core::types::{ChatMessage, RunId};

/// Category of a hop failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepErrorKind {
    /// The agent named a next agent it has no edge to.
    Routing,
    /// The model call failed.
    ModelCall,
    /// The cycle policy refused a revisit.
    CycleDetected,
    Cancelled,
}

/// A failure recorded on a [`StepResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct StepError {
    pub kind: StepErrorKind,
    pub message: String,
}

impl StepError {
    pub fn from_error(e: &ConclaveError) -> Self {
        let kind = match e {
            ConclaveError::Routing { .. } | ConclaveError::UnknownAgent(_) => StepErrorKind::Routing,
            ConclaveError::CycleDetected { .. } => StepErrorKind::CycleDetected,
            ConclaveError::Cancelled => StepErrorKind::Cancelled,
            _ => StepErrorKind::ModelCall,
        };
        Self {
            kind,
            message: e.to_string(),
        }
    }
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// One hop of a workflow run.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// 1-based, contiguous within a run.
    pub step_number: usize,
    pub agent_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Messages appended to the agent's conversation during this hop.
    pub output: Vec<ChatMessage>,
    /// Agent receiving control next; empty when the run ended here.
    pub next_agent: String,
    pub error: Option<StepError>,
}

impl StepResult {
    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }

    pub fn is_terminal(&self) -> bool {
        self.next_agent.is_empty() || self.error.is_some()
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// An agent finished the run.
    Finished,
    /// The step budget ran out.
    BudgetExhausted,
    /// The cycle policy refused a revisit.
    CycleDetected,
    /// A routing or model-call error ended the run.
    Failed,
    Cancelled,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Finished => "finished",
            Self::BudgetExhausted => "step budget exhausted",
            Self::CycleDetected => "cycle detected",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Aggregate of one workflow run.
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub run_id: RunId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub steps: Vec<StepResult>,
    pub final_answer: String,
    pub termination: Termination,
}

impl WorkflowResult {
    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn succeeded(&self) -> bool {
        self.termination == Termination::Finished
    }

    /// The error of the last step, if the run ended on one.
    pub fn error(&self) -> Option<&StepError> {
        self.steps.last().and_then(|s| s.error.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_kinds() {
        let routing = StepError::from_error(&ConclaveError::Routing {
            from: "writer".into(),
            to: "scraper".into(),
        });
        assert_eq!(routing.kind, StepErrorKind::Routing);
        assert_eq!(routing.to_string(), "No route from writer to scraper");

        let model = StepError::from_error(&ConclaveError::LlmRequest("HTTP 500".into()));
        assert_eq!(model.kind, StepErrorKind::ModelCall);

        let cycle = StepError::from_error(&ConclaveError::CycleDetected {
            agent: "a".into(),
            visits: 2,
        });
        assert_eq!(cycle.kind, StepErrorKind::CycleDetected);
    }

    #[test]
    fn test_step_terminal() {
        let now = Utc::now();
        let step = StepResult {
            step_number: 1,
            agent_name: "writer".into(),
            start_time: now,
            end_time: now,
            output: vec![],
            next_agent: String::new(),
            error: None,
        };
        assert!(step.is_terminal());
        assert_eq!(step.duration(), chrono::Duration::zero());
    }

    #[test]
    fn test_termination_display() {
        assert_eq!(Termination::BudgetExhausted.to_string(), "step budget exhausted");
    }
}
