use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConclaveError, Result};

/// Top-level Conclave configuration.
///
/// Loaded once at startup and shared read-only (behind an `Arc`) with the
/// model client and the tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
    #[serde(default)]
    pub web_search: Option<WebSearchConfig>,
    #[serde(default)]
    pub scraper: Option<ScraperConfig>,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model calls allowed per agent turn (single-agent loop and the inner
    /// tool loop of a workflow hop).
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u64,
    #[serde(default = "default_workspace")]
    pub workspace: String,
    /// Overrides the builtin ReAct system prompt of the single-agent loop.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_duration_secs: default_max_duration(),
            workspace: default_workspace(),
            system_prompt: None,
        }
    }
}

fn default_max_turns() -> usize { 5 }
fn default_max_duration() -> u64 { 600 }
fn default_workspace() -> String { ".".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl ModelConfig {
    /// Minimal config for a model id with provider defaults.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            provider: default_provider(),
            model_id: model_id.into(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            extra_headers: HashMap::new(),
            retry: None,
        }
    }

    /// Same provider settings, different model id (per-agent model routing).
    pub fn with_model_id(&self, model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            ..self.clone()
        }
    }

    /// The configured key, falling back to `OPENAI_API_KEY` for OpenAI.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| {
            if self.provider == "openai" {
                std::env::var("OPENAI_API_KEY").ok()
            } else {
                None
            }
        })
    }
}

fn default_provider() -> String { "openai".to_string() }
fn default_max_tokens() -> u32 { 4096 }
fn default_temperature() -> f32 { 0.0 }

/// Retry configuration for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// RapidAPI web search (DuckDuckGo) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    pub api_key: String,
    #[serde(default = "default_search_host")]
    pub host: String,
    #[serde(default = "default_search_results")]
    pub max_results: usize,
}

fn default_search_host() -> String { "duckduckgo8.p.rapidapi.com".to_string() }
fn default_search_results() -> usize { 2 }

/// Page scraper configuration. Without an API key pages are fetched directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_scraper_host")]
    pub host: String,
    #[serde(default = "default_scrape_length")]
    pub max_length: usize,
}

fn default_scraper_host() -> String { "scrapeninja.p.rapidapi.com".to_string() }
fn default_scrape_length() -> usize { 30_000 }

/// How the workflow executor treats an agent that is entered again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicyConfig {
    /// Revisits are always allowed.
    #[default]
    Continue,
    /// The first revisit ends the run.
    Stop,
    /// Revisits are allowed until an agent would be entered more than `n` times.
    MaxVisits(usize),
}

/// Multi-agent workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Maximum hops per run.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub cycle_policy: CyclePolicyConfig,
    /// Entry agent. Defaults to the first configured agent.
    #[serde(default)]
    pub leader: Option<String>,
    #[serde(default)]
    pub agents: Vec<WorkflowAgentConfig>,
    #[serde(default)]
    pub edges: Vec<EdgeConfig>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            cycle_policy: CyclePolicyConfig::default(),
            leader: None,
            agents: vec![],
            edges: vec![],
        }
    }
}

fn default_max_steps() -> usize { 20 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowAgentConfig {
    pub name: String,
    #[serde(default = "default_team")]
    pub team: String,
    pub instructions: String,
    /// Model id override; the `[model]` provider settings are reused.
    #[serde(default)]
    pub model: Option<String>,
    /// Builtin tool names available to this agent.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub max_turns: Option<usize>,
}

fn default_team() -> String { "default".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeConfig {
    pub from: String,
    pub to: String,
    /// Also add the reverse edge.
    #[serde(default)]
    pub bidirectional: bool,
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConclaveError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| ConclaveError::Config(e.to_string()))
    }

    /// Resolve the workspace directory (expand ~).
    pub fn workspace_dir(&self) -> PathBuf {
        let ws = &self.agent.workspace;
        if let Some(rest) = ws.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return home.join(rest);
            }
        }
        PathBuf::from(ws)
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_CONCLAVE_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_CONCLAVE_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_CONCLAVE_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_CONCLAVE_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_CONCLAVE_VAR}\"");
    }

    #[test]
    fn test_defaults_from_minimal_toml() {
        let toml_str = r#"
[model]
model_id = "gpt-4.1"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model.provider, "openai");
        assert_eq!(config.agent.max_turns, 5);
        assert_eq!(config.workflow.max_steps, 20);
        assert_eq!(config.workflow.cycle_policy, CyclePolicyConfig::Continue);
        assert!(config.workflow.agents.is_empty());
        assert!(config.web_search.is_none());
    }

    #[test]
    fn test_cycle_policy_forms() {
        let config: WorkflowConfig = toml::from_str(r#"cycle_policy = "stop""#).unwrap();
        assert_eq!(config.cycle_policy, CyclePolicyConfig::Stop);

        let config: WorkflowConfig =
            toml::from_str("cycle_policy = { max_visits = 3 }").unwrap();
        assert_eq!(config.cycle_policy, CyclePolicyConfig::MaxVisits(3));
    }

    #[test]
    fn test_workflow_agents_and_edges() {
        let toml_str = r#"
leader = "supervisor"

[[agents]]
name = "supervisor"
team = "supervisor"
instructions = "Route work."

[[agents]]
name = "scraper"
instructions = "Scrape things."
tools = ["web_search", "scrape"]
max_turns = 8

[[edges]]
from = "supervisor"
to = "scraper"
bidirectional = true
"#;
        let config: WorkflowConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.leader.as_deref(), Some("supervisor"));
        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.agents[1].team, "default");
        assert_eq!(config.agents[1].tools, vec!["web_search", "scrape"]);
        assert_eq!(config.agents[1].max_turns, Some(8));
        assert!(config.edges[0].bidirectional);
    }

    #[test]
    fn test_with_model_id_keeps_provider_settings() {
        let mut base = ModelConfig::new("gpt-4o");
        base.base_url = Some("http://localhost:11434/v1/chat/completions".into());
        let other = base.with_model_id("gpt-4.1");
        assert_eq!(other.model_id, "gpt-4.1");
        assert_eq!(other.base_url, base.base_url);
    }

    #[test]
    fn test_workspace_dir_expands_home() {
        std::env::set_var("HOME", "/home/tester");
        let mut config: AppConfig = toml::from_str("[model]\nmodel_id = \"m\"").unwrap();
        config.agent.workspace = "~/reports".into();
        assert_eq!(config.workspace_dir(), PathBuf::from("/home/tester/reports"));
    }
}
