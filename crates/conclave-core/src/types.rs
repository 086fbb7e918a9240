use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Unique identifier of one workflow or single-agent run.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single content block in a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

/// A chat message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    /// Author of the message when it is not the model or the user
    /// (the agent that produced it, or the agent handing off).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: Vec<ContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    fn with_role(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            name: None,
            content: vec![ContentBlock::Text { text: text.into() }],
            timestamp: Some(Utc::now()),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::with_role(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role(Role::User, text)
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, text)
    }

    /// A plain-text tool-role message, used for observations in the textual
    /// protocol and for hand-off payloads.
    pub fn tool_text(text: impl Into<String>) -> Self {
        Self::with_role(Role::Tool, text)
    }

    pub fn tool_result(
        tool_use_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self {
            role: Role::Tool,
            name: None,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: content.into(),
                is_error,
            }],
            timestamp: Some(Utc::now()),
        }
    }

    /// Set the author name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Extract all text content from this message.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::ToolResult { content, .. } => Some(content.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extract all tool use blocks from this message.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Stop reason from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

/// A streaming delta from the LLM.
#[derive(Debug, Clone)]
pub enum StreamDelta {
    /// A chunk of text content.
    TextDelta(String),

    /// Start of a tool use block.
    ToolUseStart {
        index: usize,
        id: String,
        name: String,
    },

    /// A chunk of tool use input JSON.
    ToolInputDelta { index: usize, delta: String },

    /// The response is complete.
    Stop(StopReason),

    /// Usage information.
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
}

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Tool definition for sending to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Context passed to tools during execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub run_id: RunId,
    /// Agent on whose behalf the tool runs.
    pub agent_name: Option<String>,
    pub working_dir: std::path::PathBuf,
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(run_id: RunId, working_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            run_id,
            agent_name: None,
            working_dir: working_dir.into(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn for_agent(&self, agent_name: &str) -> Self {
        Self {
            agent_name: Some(agent_name.to_string()),
            ..self.clone()
        }
    }
}

/// Event broadcast to all subscribers while a run progresses.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Run started.
    RunStarted { run_id: RunId, leader: String },
    /// An agent received control.
    HopStarted { step: usize, agent: String },
    /// One model call inside an agent's turn completed.
    TurnComplete { agent: String, turn: usize },
    /// Tool execution started.
    ToolStart {
        agent: String,
        name: String,
        input: serde_json::Value,
    },
    /// Tool execution completed.
    ToolEnd {
        agent: String,
        name: String,
        result: ToolResult,
    },
    /// An agent finished its hop and named the next agent ("" = terminal).
    HopCompleted {
        step: usize,
        agent: String,
        next_agent: String,
    },
    /// Run completed.
    RunComplete { run_id: RunId, total_steps: usize },
    /// Run ended with an error.
    RunError { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_text_includes_tool_results() {
        let msg = ChatMessage::tool_result("call_1", "3 files", false);
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.text(), "3 files");
    }

    #[test]
    fn test_named_message() {
        let msg = ChatMessage::tool_text("payload").named("supervisor");
        assert_eq!(msg.name.as_deref(), Some("supervisor"));
        assert!(msg.timestamp.is_some());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
