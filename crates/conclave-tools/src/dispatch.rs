use std::sync::Arc;

use tracing::{debug, warn};

use conclave_core::error::ConclaveError;
use conclave_core::event::EventBus;
use conclave_core::types::{AgentEvent, ToolContext, ToolDefinition, ToolResult};

use crate::registry::ToolRegistry;

/// Reply text for a name with no registered tool.
pub const UNKNOWN_ACTION: &str = "Unknown action";

/// Normalized outcome of one dispatched action.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub text: String,
    pub success: bool,
}

impl Observation {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
        }
    }

    /// A failure; the text is prefixed with `Error:` unless it already is.
    pub fn failed(text: impl AsRef<str>) -> Self {
        let text = text.as_ref();
        let text = if text.starts_with("Error:") {
            text.to_string()
        } else {
            format!("Error: {}", text)
        };
        Self {
            text,
            success: false,
        }
    }

    fn from_result(result: ToolResult) -> Self {
        if result.is_error {
            Self::failed(result.content)
        } else {
            Self::ok(result.content)
        }
    }
}

/// Maps action names to tools and turns every outcome into an [`Observation`].
///
/// `dispatch` never fails: unknown names, invalid arguments, tool errors,
/// timeouts and cancellation all come back as `success == false`.
#[derive(Clone)]
pub struct ActionDispatcher {
    registry: ToolRegistry,
    events: Option<Arc<EventBus>>,
}

impl ActionDispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            events: None,
        }
    }

    /// Publish `ToolStart`/`ToolEnd` for every dispatched call.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    /// Dispatch with pre-parsed JSON arguments (schema-driven protocol).
    pub async fn dispatch(
        &self,
        name: &str,
        args: serde_json::Value,
        ctx: &ToolContext,
    ) -> Observation {
        let Some(tool) = self.registry.get(name) else {
            warn!(action = name, "Unknown action");
            return Observation {
                text: UNKNOWN_ACTION.to_string(),
                success: false,
            };
        };

        if let Err(message) = check_required(name, &tool.input_schema(), &args) {
            return Observation::failed(message);
        }

        let agent = ctx.agent_name.clone().unwrap_or_default();
        self.publish(AgentEvent::ToolStart {
            agent: agent.clone(),
            name: name.to_string(),
            input: args.clone(),
        });

        let observation = match self.registry.execute(name, args, ctx.clone()).await {
            Ok(result) => {
                self.publish(AgentEvent::ToolEnd {
                    agent,
                    name: name.to_string(),
                    result: result.clone(),
                });
                Observation::from_result(result)
            }
            Err(e) => {
                let observation = Observation::failed(describe(&e));
                self.publish(AgentEvent::ToolEnd {
                    agent,
                    name: name.to_string(),
                    result: ToolResult::error(observation.text.clone()),
                });
                observation
            }
        };

        debug!(action = name, success = observation.success, "Dispatched action");
        observation
    }

    /// Dispatch the raw text of an `Action: <name>: <input>` line.
    ///
    /// The text becomes the value of the tool's primary text field.
    pub async fn dispatch_text(&self, name: &str, input: &str, ctx: &ToolContext) -> Observation {
        let args = match self.registry.get(name) {
            Some(tool) => {
                let mut args = serde_json::Map::new();
                args.insert(tool.text_input_key().to_string(), input.trim().into());
                serde_json::Value::Object(args)
            }
            None => serde_json::Value::Null,
        };
        self.dispatch(name, args, ctx).await
    }

    fn publish(&self, event: AgentEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

fn describe(e: &ConclaveError) -> String {
    match e {
        ConclaveError::ToolExecution { message, .. } => message.clone(),
        ConclaveError::ToolValidation(message) => format!("invalid arguments: {}", message),
        other => other.to_string(),
    }
}

/// Check the schema's `required` fields before the tool sees the arguments.
fn check_required(
    name: &str,
    schema: &serde_json::Value,
    args: &serde_json::Value,
) -> std::result::Result<(), String> {
    let Some(fields) = args.as_object() else {
        return Err(format!("arguments for {} must be a JSON object", name));
    };
    let missing: Vec<&str> = schema["required"]
        .as_array()
        .map(|req| {
            req.iter()
                .filter_map(|f| f.as_str())
                .filter(|f| fields.get(*f).map_or(true, |v| v.is_null()))
                .collect()
        })
        .unwrap_or_default();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "{} parameter is required for {}",
            missing.join(", "),
            name
        ))
    }
}
