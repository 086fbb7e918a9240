use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use conclave_core::error::{ConclaveError, Result};
use conclave_core::traits::Tool;
use conclave_core::types::{ToolContext, ToolResult};

use super::truncate;

const MAX_OUTPUT: usize = 30_000;

pub struct BashTool;

#[derive(Deserialize)]
struct BashInput {
    command: String,
    #[serde(default = "default_timeout")]
    timeout: u64,
}

fn default_timeout() -> u64 { 120 }

impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a bash command. Returns stdout and stderr. e.g. bash: uname -a"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (default 120)",
                    "default": 120
                }
            },
            "required": ["command"]
        })
    }

    fn text_input_key(&self) -> &str {
        "command"
    }

    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let params: BashInput = serde_json::from_value(input)
                .map_err(|e| ConclaveError::ToolValidation(e.to_string()))?;

            debug!(command = %params.command, "Executing bash command");

            let timeout = std::time::Duration::from_secs(params.timeout);
            let result = tokio::time::timeout(timeout, async {
                tokio::process::Command::new("bash")
                    .arg("-c")
                    .arg(&params.command)
                    .current_dir(&ctx.working_dir)
                    .kill_on_drop(true)
                    .output()
                    .await
            })
            .await;

            match result {
                Ok(Ok(output)) => {
                    let stdout = String::from_utf8_lossy(&output.stdout);
                    let stderr = String::from_utf8_lossy(&output.stderr);

                    let mut content = String::new();
                    if !stdout.trim().is_empty() {
                        content.push_str(stdout.trim_end());
                    }
                    if !stderr.trim().is_empty() {
                        if !content.is_empty() {
                            content.push('\n');
                        }
                        content.push_str("STDERR:\n");
                        content.push_str(stderr.trim_end());
                    }

                    let mut content = truncate(content, MAX_OUTPUT);
                    if content.is_empty() {
                        content = "(no output)".to_string();
                    }

                    if output.status.success() {
                        Ok(ToolResult::success(content))
                    } else {
                        let code = output.status.code().unwrap_or(-1);
                        Ok(ToolResult::error(format!("Exit code {}\n{}", code, content)))
                    }
                }
                Ok(Err(e)) => Err(ConclaveError::ToolExecution {
                    tool: "bash".to_string(),
                    message: e.to_string(),
                }),
                Err(_) => Err(ConclaveError::ToolTimeout {
                    tool: "bash".to_string(),
                    timeout_secs: params.timeout,
                }),
            }
        })
    }

    fn timeout_secs(&self) -> u64 {
        120
    }
}
