use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use conclave_core::error::{ConclaveError, Result};
use conclave_core::traits::Tool;
use conclave_core::types::{ToolContext, ToolResult};

use super::resolve;

/// Read, write, list, and create files under the working directory.
pub struct ManageFilesTool;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
enum FileAction {
    Read,
    Write,
    List,
    Mkdir,
}

#[derive(Deserialize)]
struct ManageFilesInput {
    action: FileAction,
    path: String,
    #[serde(default)]
    content: Option<String>,
}

fn io_error(path: &std::path::Path, e: std::io::Error) -> ConclaveError {
    ConclaveError::ToolExecution {
        tool: "manage_files".into(),
        message: format!("{}: {}", path.display(), e),
    }
}

impl Tool for ManageFilesTool {
    fn name(&self) -> &str {
        "manage_files"
    }

    fn description(&self) -> &str {
        "Read, write, and list files. Relative paths resolve against the working directory."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "description": "The action to perform: read, write, list or mkdir",
                    "enum": ["read", "write", "list", "mkdir"]
                },
                "path": {
                    "type": "string",
                    "description": "The file or directory path"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write (only for write action)"
                }
            },
            "required": ["action", "path"]
        })
    }

    fn text_input_key(&self) -> &str {
        "path"
    }

    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let params: ManageFilesInput = serde_json::from_value(input)
                .map_err(|e| ConclaveError::ToolValidation(e.to_string()))?;
            let path = resolve(&params.path, &ctx.working_dir);

            debug!(action = ?params.action, path = %path.display(), "Managing files");

            match params.action {
                FileAction::Read => {
                    let content = tokio::fs::read_to_string(&path)
                        .await
                        .map_err(|e| io_error(&path, e))?;
                    Ok(ToolResult::success(content))
                }
                FileAction::Write => {
                    let content = params.content.ok_or_else(|| {
                        ConclaveError::ToolValidation(
                            "content parameter is required for write operation".into(),
                        )
                    })?;
                    if let Some(parent) = path.parent() {
                        tokio::fs::create_dir_all(parent)
                            .await
                            .map_err(|e| io_error(parent, e))?;
                    }
                    tokio::fs::write(&path, &content)
                        .await
                        .map_err(|e| io_error(&path, e))?;
                    Ok(ToolResult::success(format!(
                        "File {} written successfully ({} bytes)",
                        path.display(),
                        content.len()
                    )))
                }
                FileAction::List => {
                    let mut entries = tokio::fs::read_dir(&path)
                        .await
                        .map_err(|e| io_error(&path, e))?;
                    let mut names = Vec::new();
                    while let Some(entry) = entries
                        .next_entry()
                        .await
                        .map_err(|e| io_error(&path, e))?
                    {
                        let mut name = entry.file_name().to_string_lossy().into_owned();
                        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                            name.push('/');
                        }
                        names.push(name);
                    }
                    names.sort();
                    if names.is_empty() {
                        return Ok(ToolResult::success("(empty directory)"));
                    }
                    Ok(ToolResult::success(names.join("\n")))
                }
                FileAction::Mkdir => {
                    tokio::fs::create_dir_all(&path)
                        .await
                        .map_err(|e| io_error(&path, e))?;
                    Ok(ToolResult::success(format!(
                        "Directory {} created",
                        path.display()
                    )))
                }
            }
        })
    }
}
