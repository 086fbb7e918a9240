//! Mocks and fixtures shared by the Conclave test suites.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use conclave_core::config::{AppConfig, ModelConfig};
use conclave_core::error::{ConclaveError, Result};
use conclave_core::traits::{LlmClient, Tool};
use conclave_core::types::*;

enum Scripted {
    Reply(Vec<StreamDelta>),
    Error(ConclaveError),
}

fn text_deltas(text: &str) -> Vec<StreamDelta> {
    vec![
        StreamDelta::TextDelta(text.to_string()),
        StreamDelta::Stop(StopReason::EndTurn),
    ]
}

/// An [`LlmClient`] that plays back a fixed script of replies, one per call.
///
/// Once the script runs out every further call gets the `otherwise` reply
/// (an empty text reply unless [`ScriptedLlm::otherwise_text`] set one).
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Scripted>>,
    otherwise: Mutex<Vec<StreamDelta>>,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    seen_tools: Arc<Mutex<Vec<Vec<String>>>>,
}

impl Default for ScriptedLlm {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            otherwise: Mutex::new(text_deltas("")),
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
            seen_tools: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn push(self, item: Scripted) -> Self {
        self.script.lock().unwrap().push_back(item);
        self
    }

    /// Queue a plain-text reply.
    pub fn then_text(self, text: &str) -> Self {
        self.push(Scripted::Reply(text_deltas(text)))
    }

    /// Queue a reply carrying one structured tool call.
    pub fn then_tool_call(self, name: &str, input: serde_json::Value) -> Self {
        let n = self.script.lock().unwrap().len();
        self.push(Scripted::Reply(vec![
            StreamDelta::ToolUseStart {
                index: 0,
                id: format!("call_{}", n),
                name: name.to_string(),
            },
            StreamDelta::ToolInputDelta {
                index: 0,
                delta: input.to_string(),
            },
            StreamDelta::Stop(StopReason::ToolUse),
        ]))
    }

    /// Queue a failed call.
    pub fn then_error(self, err: ConclaveError) -> Self {
        self.push(Scripted::Error(err))
    }

    /// Reply used for every call after the script is exhausted.
    pub fn otherwise_text(self, text: &str) -> Self {
        *self.otherwise.lock().unwrap() = text_deltas(text);
        self
    }

    /// Shared count of `chat_stream` calls.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// Shared log of the messages sent on each call.
    pub fn seen_messages(&self) -> Arc<Mutex<Vec<Vec<ChatMessage>>>> {
        self.seen.clone()
    }

    /// Shared log of the tool names offered on each call.
    pub fn seen_tools(&self) -> Arc<Mutex<Vec<Vec<String>>>> {
        self.seen_tools.clone()
    }
}

impl LlmClient for ScriptedLlm {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages);
        self.seen_tools
            .lock()
            .unwrap()
            .push(tools.iter().map(|t| t.name.clone()).collect());

        let next = self.script.lock().unwrap().pop_front();
        let outcome = match next {
            Some(Scripted::Reply(deltas)) => Ok(deltas),
            Some(Scripted::Error(e)) => Err(e),
            None => Ok(self.otherwise.lock().unwrap().clone()),
        };

        Box::pin(async move {
            let deltas = outcome?;
            let stream = futures::stream::iter(deltas.into_iter().map(Ok));
            Ok(Box::pin(stream) as BoxStream<'_, Result<StreamDelta>>)
        })
    }
}

/// A tool that records every input it receives and answers with a fixed reply.
pub struct RecordingTool {
    name: String,
    reply: ToolResult,
    required: Vec<String>,
    text_key: String,
    inputs: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl RecordingTool {
    pub fn new(name: &str, reply: &str) -> Self {
        Self {
            name: name.to_string(),
            reply: ToolResult::success(reply),
            required: vec![],
            text_key: "input".to_string(),
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer with an error result instead.
    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            reply: ToolResult::error(message),
            ..Self::new(name, "")
        }
    }

    /// Declare a required string field; also used as the text input key.
    pub fn requiring(mut self, field: &str) -> Self {
        self.required.push(field.to_string());
        self.text_key = field.to_string();
        self
    }

    pub fn inputs(&self) -> Arc<Mutex<Vec<serde_json::Value>>> {
        self.inputs.clone()
    }
}

impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Records its input."
    }

    fn input_schema(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .required
            .iter()
            .map(|f| (f.clone(), serde_json::json!({ "type": "string" })))
            .collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }

    fn text_input_key(&self) -> &str {
        &self.text_key
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        self.inputs.lock().unwrap().push(input);
        let reply = self.reply.clone();
        Box::pin(async move { Ok(reply) })
    }
}

/// A tool that never finishes on its own; it only returns when cancelled.
pub struct StallingTool;

impl Tool for StallingTool {
    fn name(&self) -> &str {
        "stall"
    }

    fn description(&self) -> &str {
        "Waits until cancelled."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    fn execute(
        &self,
        _input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            ctx.cancel.cancelled().await;
            Err(ConclaveError::Cancelled)
        })
    }
}

/// A tool context rooted at `dir`.
pub fn test_ctx(dir: &Path) -> ToolContext {
    ToolContext::new(RunId::from_str("test-run"), dir)
}

/// Minimal model config for tests.
pub fn test_model() -> ModelConfig {
    ModelConfig::new("test-model")
}

/// Parse an [`AppConfig`] from TOML text, panicking on failure.
pub fn config_from_toml(toml_str: &str) -> AppConfig {
    toml::from_str(toml_str).expect("test config should parse")
}

/// Write `toml_str` to `conclave.toml` inside a fresh temp dir.
pub fn write_temp_config(toml_str: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("conclave.toml");
    std::fs::write(&path, toml_str).expect("write config");
    (dir, path)
}
