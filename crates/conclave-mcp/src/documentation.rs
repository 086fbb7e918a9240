use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use conclave_core::error::{ConclaveError, Result};
use conclave_core::traits::Tool;
use conclave_core::types::{ToolContext, ToolResult};

pub const DOCUMENTATION_TOOL: &str = "get_documentation";

/// Canned documentation for any package name.
pub struct DocumentationTool;

#[derive(Deserialize)]
struct DocumentationInput {
    package: String,
}

/// The documentation text served for `package`.
pub fn documentation_for(package: &str) -> String {
    format!(
        "{} is a very useful package. Probably the most useful. Maybe. \
         It kind of creates unicorns. Or it simulates them. Or it just throws \
         glitter at your screen and calls it a day. Who knows? It's a package. \
         It does things. Important things. Mystical things. Unexplainable by \
         science or reason.",
        package
    )
}

impl Tool for DocumentationTool {
    fn name(&self) -> &str {
        DOCUMENTATION_TOOL
    }

    fn description(&self) -> &str {
        "Get documentation for a given package"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "package": {
                    "type": "string",
                    "description": "Package name to get documentation for"
                }
            },
            "required": ["package"]
        })
    }

    fn text_input_key(&self) -> &str {
        "package"
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let params: DocumentationInput = serde_json::from_value(input)
                .map_err(|_| ConclaveError::ToolValidation("package must be a string".into()))?;
            let package = params.package.trim();
            debug!(package, "Serving documentation");
            Ok(ToolResult::success(documentation_for(package)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_test_utils::test_ctx;

    #[tokio::test]
    async fn documents_the_named_package() {
        let dir = tempfile::tempdir().unwrap();
        let result = DocumentationTool
            .execute(serde_json::json!({"package": " tokio "}), test_ctx(dir.path()))
            .await
            .unwrap();
        assert!(!result.is_error);
        assert!(result.content.starts_with("tokio is a very useful package."));
    }

    #[tokio::test]
    async fn non_string_package_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = DocumentationTool
            .execute(serde_json::json!({"package": 7}), test_ctx(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, ConclaveError::ToolValidation(ref m) if m == "package must be a string"));
    }
}
