use std::collections::HashMap;

use conclave_core::config::CyclePolicyConfig;
use conclave_core::error::{ConclaveError, Result};

/// Per-run visit counts. The run's first agent starts with one visit.
#[derive(Debug, Clone, Default)]
pub struct CycleState {
    visits: HashMap<String, usize>,
}

impl CycleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an entry into `agent` and return its visit total.
    pub fn enter(&mut self, agent: &str) -> usize {
        let count = self.visits.entry(agent.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn visits(&self, agent: &str) -> usize {
        self.visits.get(agent).copied().unwrap_or(0)
    }
}

/// Decides whether entering an agent again is allowed.
pub trait CycleHandler: Send + Sync {
    /// Short policy name for logs.
    fn name(&self) -> &str;

    /// Called after `agent`'s visit count was raised to `visits`.
    fn check(&self, agent: &str, visits: usize) -> Result<()>;
}

/// Revisits are always allowed; only the step budget bounds the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinueOnCycle;

impl CycleHandler for ContinueOnCycle {
    fn name(&self) -> &str {
        "continue"
    }

    fn check(&self, _agent: &str, _visits: usize) -> Result<()> {
        Ok(())
    }
}

/// The first revisit of any agent ends the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopOnCycle;

impl CycleHandler for StopOnCycle {
    fn name(&self) -> &str {
        "stop"
    }

    fn check(&self, agent: &str, visits: usize) -> Result<()> {
        if visits > 1 {
            return Err(ConclaveError::CycleDetected {
                agent: agent.to_string(),
                visits,
            });
        }
        Ok(())
    }
}

/// Revisits are allowed until an agent would be entered more than `n` times.
#[derive(Debug, Clone, Copy)]
pub struct MaxVisits(pub usize);

impl CycleHandler for MaxVisits {
    fn name(&self) -> &str {
        "max_visits"
    }

    fn check(&self, agent: &str, visits: usize) -> Result<()> {
        if visits > self.0 {
            return Err(ConclaveError::CycleDetected {
                agent: agent.to_string(),
                visits,
            });
        }
        Ok(())
    }
}

/// Build the handler named by the `[workflow] cycle_policy` setting.
pub fn from_config(policy: &CyclePolicyConfig) -> Box<dyn CycleHandler> {
    match policy {
        CyclePolicyConfig::Continue => Box::new(ContinueOnCycle),
        CyclePolicyConfig::Stop => Box::new(StopOnCycle),
        CyclePolicyConfig::MaxVisits(n) => Box::new(MaxVisits((*n).max(1))),
    }
}
