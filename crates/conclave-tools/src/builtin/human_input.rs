use futures::future::BoxFuture;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use conclave_core::error::{ConclaveError, Result};
use conclave_core::traits::Tool;
use conclave_core::types::{ToolContext, ToolResult};

/// Asks the operator a question on the terminal and returns the typed line.
pub struct HumanInputTool;

#[derive(Deserialize)]
struct HumanInputInput {
    question: String,
}

impl Tool for HumanInputTool {
    fn name(&self) -> &str {
        "human_input"
    }

    fn description(&self) -> &str {
        "Ask a human for input"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to ask the human"
                }
            },
            "required": ["question"]
        })
    }

    fn text_input_key(&self) -> &str {
        "question"
    }

    // A person is on the other end.
    fn timeout_secs(&self) -> u64 {
        3600
    }

    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let params: HumanInputInput = serde_json::from_value(input)
                .map_err(|e| ConclaveError::ToolValidation(e.to_string()))?;

            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(
                    format!("\nHuman input needed: {}\nYour response: ", params.question)
                        .as_bytes(),
                )
                .await?;
            stdout.flush().await?;

            let mut line = String::new();
            let mut reader = BufReader::new(tokio::io::stdin());
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(ConclaveError::Cancelled),
                read = reader.read_line(&mut line) => { read?; }
            }

            let answer = line.trim();
            if answer.is_empty() {
                return Ok(ToolResult::error("No response given"));
            }
            Ok(ToolResult::success(answer))
        })
    }
}
