use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::warn;

use conclave_core::error::Result;
use conclave_core::types::*;

/// A complete model reply: free text and/or structured tool calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: Option<StopReason>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl ModelReply {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            stop_reason: Some(StopReason::EndTurn),
            ..Default::default()
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// The assistant message to append to the conversation.
    pub fn to_message(&self) -> ChatMessage {
        let mut content = Vec::new();
        if !self.text.is_empty() {
            content.push(ContentBlock::Text {
                text: self.text.clone(),
            });
        }
        for call in &self.tool_calls {
            content.push(ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input: call.input.clone(),
            });
        }
        ChatMessage {
            role: Role::Assistant,
            name: None,
            content,
            timestamp: Some(chrono::Utc::now()),
        }
    }
}

/// Accumulator for streaming tool call deltas.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    input_json: String,
}

impl ToolCallAccumulator {
    fn finish(self, index: usize) -> ToolCall {
        let input = if self.input_json.trim().is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(&self.input_json).unwrap_or_else(|e| {
                warn!(tool = %self.name, error = %e, "Tool call arguments are not valid JSON");
                serde_json::Value::Null
            })
        };
        let id = if self.id.is_empty() {
            format!("call_{}", index)
        } else {
            self.id
        };
        ToolCall {
            id,
            name: self.name,
            input,
        }
    }
}

/// Drain a delta stream into a [`ModelReply`].
pub async fn collect_reply(mut stream: BoxStream<'_, Result<StreamDelta>>) -> Result<ModelReply> {
    let mut reply = ModelReply::default();
    let mut calls: Vec<ToolCallAccumulator> = Vec::new();

    while let Some(delta) = stream.next().await {
        match delta? {
            StreamDelta::TextDelta(text) => reply.text.push_str(&text),
            StreamDelta::ToolUseStart { index, id, name } => {
                while calls.len() <= index {
                    calls.push(ToolCallAccumulator::default());
                }
                calls[index].id = id;
                calls[index].name = name;
            }
            StreamDelta::ToolInputDelta { index, delta } => {
                if let Some(call) = calls.get_mut(index) {
                    call.input_json.push_str(&delta);
                }
            }
            StreamDelta::Stop(reason) => reply.stop_reason = Some(reason),
            StreamDelta::Usage {
                input_tokens,
                output_tokens,
            } => {
                reply.input_tokens += input_tokens;
                reply.output_tokens += output_tokens;
            }
        }
    }

    reply.tool_calls = calls
        .into_iter()
        .enumerate()
        .filter(|(_, c)| !c.name.is_empty())
        .map(|(i, c)| c.finish(i))
        .collect();
    Ok(reply)
}
