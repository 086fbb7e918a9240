use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConclaveError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    #[error("LLM provider not supported: {0}")]
    UnsupportedProvider(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Tool timeout after {timeout_secs}s: {tool}")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("Tool input validation failed: {0}")]
    ToolValidation(String),

    // Graph setup errors
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),

    #[error("Agent {agent} is not a member of team {team}")]
    NotTeamMember { agent: String, team: String },

    // Run-time routing errors
    #[error("No route from {from} to {to}")]
    Routing { from: String, to: String },

    #[error("Cycle detected: agent {agent} visited {visits} times")]
    CycleDetected { agent: String, visits: usize },

    #[error("Agent run cancelled")]
    Cancelled,

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // MCP errors
    #[error("MCP error: {0}")]
    Mcp(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConclaveError {
    /// Whether this error belongs to graph setup rather than a run.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::ConfigNotFound(_)
                | Self::UnknownAgent(_)
                | Self::DuplicateAgent(_)
                | Self::NotTeamMember { .. }
        )
    }

    /// Whether this error came from the model-call collaborator.
    pub fn is_model_call(&self) -> bool {
        matches!(
            self,
            Self::LlmRequest(_)
                | Self::LlmStream(_)
                | Self::LlmParse(_)
                | Self::UnsupportedProvider(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ConclaveError>;
