use std::collections::HashMap;

use tracing::debug;

use conclave_core::config::AppConfig;
use conclave_core::error::{ConclaveError, Result};

use super::agent::{Agent, Team};
use super::edge::Edge;

/// Directed graph of agents: who exists, which team they belong to, and
/// which hand-offs are allowed.
///
/// Cycles are expected (a supervisor and its workers talk back and forth),
/// so nothing is checked for acyclicity; the executor's cycle policy decides
/// how often an agent may be re-entered.
#[derive(Debug, Clone, Default)]
pub struct AgentGraph {
    agents: HashMap<String, Agent>,
    order: Vec<String>,
    teams: Vec<Team>,
    edges: Vec<Edge>,
}

impl AgentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `agent` as a member of `team`, creating the team if needed.
    pub fn add_agent(&mut self, agent: Agent, team: &str) -> Result<()> {
        if self.agents.contains_key(&agent.name) {
            return Err(ConclaveError::DuplicateAgent(agent.name));
        }
        let name = agent.name.clone();
        match self.teams.iter_mut().find(|t| t.name == team) {
            Some(t) => t.members.push(name.clone()),
            None => {
                let mut t = Team::new(team);
                t.members.push(name.clone());
                self.teams.push(t);
            }
        }
        debug!(agent = %name, team, "Agent added to graph");
        self.order.push(name.clone());
        self.agents.insert(name, agent);
        Ok(())
    }

    /// Allow `from` to hand off to `to`. Adding an existing edge is a no-op.
    pub fn connect(&mut self, from: &str, to: &str) -> Result<()> {
        for name in [from, to] {
            if !self.agents.contains_key(name) {
                return Err(ConclaveError::UnknownAgent(name.to_string()));
            }
        }
        let edge = Edge::new(from, to);
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
        Ok(())
    }

    /// Make `agent` the entry point of `team`.
    pub fn set_leader(&mut self, agent: &str, team: &str) -> Result<()> {
        if !self.agents.contains_key(agent) {
            return Err(ConclaveError::UnknownAgent(agent.to_string()));
        }
        let t = self
            .teams
            .iter_mut()
            .find(|t| t.name == team && t.contains(agent))
            .ok_or_else(|| ConclaveError::NotTeamMember {
                agent: agent.to_string(),
                team: team.to_string(),
            })?;
        t.leader = Some(agent.to_string());
        Ok(())
    }

    /// Check that `from` may hand off to `to`.
    pub fn validate_route(&self, from: &str, to: &str) -> Result<()> {
        if self.edges.iter().any(|e| e.from == from && e.to == to) {
            Ok(())
        } else {
            Err(ConclaveError::Routing {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// Agents `name` may hand off to, in edge order.
    pub fn successors(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.from == name)
            .map(|e| e.to.as_str())
            .collect()
    }

    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.get(name)
    }

    /// Agent names in registration order.
    pub fn agent_names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn team(&self, name: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.name == name)
    }

    pub fn team_of(&self, agent: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.contains(agent))
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn leader_of(&self, team: &str) -> Option<&str> {
        self.team(team).and_then(|t| t.leader.as_deref())
    }

    /// Where a run starts: the first team leader set, else the first agent.
    pub fn entry(&self) -> Option<&str> {
        self.teams
            .iter()
            .find_map(|t| t.leader.as_deref())
            .or_else(|| self.order.first().map(|s| s.as_str()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Build the graph described by the `[workflow]` config section.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let workflow = &config.workflow;
        let mut graph = Self::new();

        for entry in &workflow.agents {
            graph.add_agent(Agent::from_config(entry, config)?, &entry.team)?;
        }
        for edge in &workflow.edges {
            graph.connect(&edge.from, &edge.to)?;
            if edge.bidirectional {
                graph.connect(&edge.to, &edge.from)?;
            }
        }

        let leader = match &workflow.leader {
            Some(leader) => Some(leader.clone()),
            None => graph.order.first().cloned(),
        };
        if let Some(leader) = leader {
            let team = graph
                .team_of(&leader)
                .map(|t| t.name.clone())
                .ok_or_else(|| ConclaveError::UnknownAgent(leader.clone()))?;
            graph.set_leader(&leader, &team)?;
        }

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_test_utils::config_from_toml;

    fn trio() -> AgentGraph {
        let mut graph = AgentGraph::new();
        graph
            .add_agent(Agent::new("supervisor", "Route."), "supervisor")
            .unwrap();
        graph
            .add_agent(Agent::new("scraper", "Search."), "research")
            .unwrap();
        graph
            .add_agent(Agent::new("writer", "Write."), "document")
            .unwrap();
        graph
    }

    #[test]
    fn test_connect_requires_registered_endpoints() {
        let mut graph = trio();
        let err = graph.connect("supervisor", "painter").unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, ConclaveError::UnknownAgent(ref n) if n == "painter"));
        assert!(graph.connect("ghost", "writer").unwrap_err().is_configuration());

        graph.connect("supervisor", "writer").unwrap();
        assert!(graph.validate_route("supervisor", "writer").is_ok());
        // Edges are directed.
        assert!(matches!(
            graph.validate_route("writer", "supervisor"),
            Err(ConclaveError::Routing { .. })
        ));
    }

    #[test]
    fn test_duplicate_agents_and_edges() {
        let mut graph = trio();
        let err = graph
            .add_agent(Agent::new("writer", "Again."), "document")
            .unwrap_err();
        assert!(matches!(err, ConclaveError::DuplicateAgent(_)));

        graph.connect("supervisor", "scraper").unwrap();
        graph.connect("supervisor", "scraper").unwrap();
        assert_eq!(graph.edges().len(), 1);
    }

    #[test]
    fn test_cycles_are_allowed() {
        let mut graph = trio();
        graph.connect("supervisor", "scraper").unwrap();
        graph.connect("scraper", "supervisor").unwrap();
        graph.connect("supervisor", "writer").unwrap();
        assert_eq!(graph.successors("supervisor"), vec!["scraper", "writer"]);
        assert_eq!(graph.successors("scraper"), vec!["supervisor"]);
        assert!(graph.successors("writer").is_empty());
    }

    #[test]
    fn test_set_leader_checks_membership() {
        let mut graph = trio();
        let err = graph.set_leader("writer", "research").unwrap_err();
        assert!(matches!(err, ConclaveError::NotTeamMember { .. }));
        assert!(graph.set_leader("ghost", "research").is_err());

        assert_eq!(graph.entry(), Some("supervisor"));
        graph.set_leader("scraper", "research").unwrap();
        assert_eq!(graph.leader_of("research"), Some("scraper"));
        assert_eq!(graph.entry(), Some("scraper"));
        assert_eq!(graph.team_of("writer").unwrap().name, "document");
    }

    #[test]
    fn test_from_config() {
        let config = config_from_toml(
            r#"
[model]
model_id = "gpt-4o"

[workflow]
leader = "supervisor"

[[workflow.agents]]
name = "supervisor"
team = "supervisor"
instructions = "Route."
tools = ["human_input"]

[[workflow.agents]]
name = "scraper"
team = "research"
instructions = "Search."
tools = ["web_search", "scrape"]

[[workflow.edges]]
from = "supervisor"
to = "scraper"
bidirectional = true
"#,
        );
        let graph = AgentGraph::from_config(&config).unwrap();
        assert_eq!(graph.agent_names(), vec!["supervisor", "scraper"]);
        assert_eq!(graph.leader_of("supervisor"), Some("supervisor"));
        assert!(graph.validate_route("scraper", "supervisor").is_ok());
        assert_eq!(
            graph.agent("scraper").unwrap().tools.list(),
            vec!["web_search", "scrape"]
        );
    }

    #[test]
    fn test_from_config_rejects_bad_edge() {
        let config = config_from_toml(
            r#"
[model]
model_id = "m"

[[workflow.agents]]
name = "solo"
instructions = "Alone."

[[workflow.edges]]
from = "solo"
to = "nobody"
"#,
        );
        let err = AgentGraph::from_config(&config).unwrap_err();
        assert!(err.is_configuration());
    }
}
