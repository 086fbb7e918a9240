use conclave_core::config::{AppConfig, WorkflowAgentConfig};
use conclave_core::error::Result;
use conclave_tools::ToolRegistry;

/// An agent in the workflow graph.
///
/// Each agent is an independent model-driven participant with its own
/// instructions, tool set and, optionally, its own model id. Agents are not
/// changed once the graph is built.
#[derive(Clone)]
pub struct Agent {
    /// Unique name; also what other agents hand off to.
    pub name: String,
    /// Sent as the system message when the agent first receives control.
    pub instructions: String,
    /// Model id override. `None` uses the executor's model.
    pub model: Option<String>,
    /// Tools this agent may call.
    pub tools: ToolRegistry,
    /// Model calls allowed per hop. `None` uses the executor's default.
    pub max_turns: Option<usize>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("tools", &self.tools.list())
            .field("max_turns", &self.max_turns)
            .finish()
    }
}

impl Agent {
    /// Create an agent with no tools.
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model: None,
            tools: ToolRegistry::new(),
            max_turns: None,
        }
    }

    /// Set the model id.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the tool set.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Set max turns per hop.
    pub fn with_max_turns(mut self, turns: usize) -> Self {
        self.max_turns = Some(turns.max(1));
        self
    }

    /// Build an agent from its `[[workflow.agents]]` entry.
    pub fn from_config(entry: &WorkflowAgentConfig, config: &AppConfig) -> Result<Self> {
        let mut agent = Self::new(&entry.name, &entry.instructions)
            .with_tools(ToolRegistry::from_names(&entry.tools, config)?);
        agent.model = entry.model.clone();
        agent.max_turns = entry.max_turns;
        Ok(agent)
    }
}

/// A named grouping of agents. Membership does not affect routing.
#[derive(Debug, Clone, Default)]
pub struct Team {
    pub name: String,
    pub members: Vec<String>,
    pub leader: Option<String>,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn contains(&self, agent: &str) -> bool {
        self.members.iter().any(|m| m == agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_test_utils::{config_from_toml, RecordingTool};

    #[test]
    fn test_agent_builder() {
        let mut tools = ToolRegistry::new();
        tools.register(RecordingTool::new("web_search", ""));
        let agent = Agent::new("scraper", "You find things.")
            .with_model("gpt-4.1")
            .with_tools(tools)
            .with_max_turns(0);

        assert_eq!(agent.name, "scraper");
        assert_eq!(agent.model.as_deref(), Some("gpt-4.1"));
        assert_eq!(agent.tools.list(), vec!["web_search"]);
        assert_eq!(agent.max_turns, Some(1));
        assert!(format!("{:?}", agent).contains("web_search"));
    }

    #[test]
    fn test_agent_from_config() {
        let config = config_from_toml(
            r#"
[model]
model_id = "gpt-4o"

[[workflow.agents]]
name = "writer"
instructions = "Write."
tools = ["manage_files"]
model = "gpt-4.1"
"#,
        );
        let agent = Agent::from_config(&config.workflow.agents[0], &config).unwrap();
        assert_eq!(agent.tools.list(), vec!["manage_files"]);
        assert_eq!(agent.model.as_deref(), Some("gpt-4.1"));
        assert_eq!(agent.max_turns, None);
    }

    #[test]
    fn test_team_membership() {
        let mut team = Team::new("research");
        team.members.push("scraper".into());
        assert!(team.contains("scraper"));
        assert!(!team.contains("writer"));
    }
}
