use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use conclave_core::config::AppConfig;
use conclave_core::error::{ConclaveError, Result};
use conclave_core::traits::Tool;
use conclave_core::types::{ToolContext, ToolDefinition, ToolResult};

use crate::builtin;

/// Registry of the tools one agent (or the single-agent loop) may call.
///
/// The same tool may be bound in several registries; each binding is independent.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    // Registration order, so definitions reach the model in a stable order.
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. A later tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: impl Tool) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    /// Unregister a tool by name.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.order.retain(|n| n != name);
        self.tools.remove(name).is_some()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List registered tool names in registration order.
    pub fn list(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Get tool definitions for sending to the LLM.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Execute a tool by name, bounded by its timeout and the context's cancel token.
    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| ConclaveError::ToolNotFound(name.to_string()))?;

        let timeout = std::time::Duration::from_secs(tool.timeout_secs());
        let cancel = ctx.cancel.clone();

        debug!(tool = name, "Executing tool");

        tokio::select! {
            _ = cancel.cancelled() => Err(ConclaveError::Cancelled),
            result = tokio::time::timeout(timeout, tool.execute(input, ctx)) => match result {
                Ok(result) => result,
                Err(_) => Err(ConclaveError::ToolTimeout {
                    tool: name.to_string(),
                    timeout_secs: tool.timeout_secs(),
                }),
            },
        }
    }

    /// Create a registry with every builtin tool, configured from `config`.
    pub fn with_builtins(config: &AppConfig) -> Self {
        let mut registry = Self::new();
        for name in builtin::BUILTIN_NAMES {
            if let Some(tool) = builtin::create(name, config) {
                registry.register_arc(tool);
            }
        }
        registry
    }

    /// Create a registry holding the named builtin tools.
    ///
    /// Fails with a configuration error on an unknown name.
    pub fn from_names(names: &[String], config: &AppConfig) -> Result<Self> {
        let mut registry = Self::new();
        for name in names {
            let tool = builtin::create(name, config)
                .ok_or_else(|| ConclaveError::Config(format!("unknown tool: {}", name)))?;
            registry.register_arc(tool);
        }
        Ok(registry)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
