use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, JsonObject, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo, Tool as McpTool,
};
use rmcp::service::RequestContext;
use rmcp::ErrorData as McpError;
use rmcp::{RoleServer, ServiceExt};

use conclave_core::error::{ConclaveError, Result};
use conclave_core::types::{RunId, ToolContext};
use conclave_tools::{ActionDispatcher, ToolRegistry};

use crate::documentation::DocumentationTool;

/// Exposes a tool registry to MCP clients.
///
/// Calls go through the same dispatcher the agents use, so argument checks
/// and error text match what a model would see in a workflow.
#[derive(Clone)]
pub struct ToolServer {
    name: String,
    dispatcher: ActionDispatcher,
    working_dir: PathBuf,
}

impl ToolServer {
    pub fn new(name: &str, registry: ToolRegistry) -> Self {
        Self {
            name: name.to_string(),
            dispatcher: ActionDispatcher::new(registry),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// The registry's tools in MCP form.
    pub fn tools(&self) -> Vec<McpTool> {
        self.dispatcher
            .definitions()
            .into_iter()
            .map(|def| {
                let schema = match def.input_schema {
                    serde_json::Value::Object(map) => map,
                    _ => JsonObject::new(),
                };
                McpTool::new(def.name, def.description, Arc::new(schema))
            })
            .collect()
    }

    /// Run one tool. Failures come back as an error result, never as a
    /// protocol error.
    pub async fn call(&self, name: &str, arguments: Option<JsonObject>) -> CallToolResult {
        let args = serde_json::Value::Object(arguments.unwrap_or_default());
        let ctx = ToolContext::new(RunId::new(), &self.working_dir);
        let observation = self.dispatcher.dispatch(name, args, &ctx).await;
        debug!(tool = name, success = observation.success, "MCP tool call");
        let content = vec![Content::text(observation.text)];
        if observation.success {
            CallToolResult::success(content)
        } else {
            CallToolResult::error(content)
        }
    }
}

#[allow(clippy::manual_async_fn)]
impl ServerHandler for ToolServer {
    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _ctx: RequestContext<RoleServer>,
    ) -> impl Future<Output = std::result::Result<ListToolsResult, McpError>> + Send + '_ {
        async { Ok(ListToolsResult::with_all_items(self.tools())) }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _ctx: RequestContext<RoleServer>,
    ) -> impl Future<Output = std::result::Result<CallToolResult, McpError>> + Send + '_ {
        async move { Ok(self.call(&request.name, request.arguments).await) }
    }

    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info = Implementation {
            name: self.name.clone(),
            title: None,
            version: env!("CARGO_PKG_VERSION").into(),
            description: None,
            icons: None,
            website_url: None,
        };
        info
    }
}

/// The package documentation provider: a single `get_documentation` tool.
pub fn documentation_server() -> ToolServer {
    let mut registry = ToolRegistry::new();
    registry.register(DocumentationTool);
    ToolServer::new("Package Documentation Provider", registry)
}

/// Serve `server` on stdin/stdout until the client disconnects.
pub async fn serve_stdio(server: ToolServer) -> Result<()> {
    info!(server = %server.name, tools = server.tools().len(), "MCP server listening on stdio");
    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| ConclaveError::Mcp(format!("Failed to start MCP server: {}", e)))?;
    let reason = service
        .waiting()
        .await
        .map_err(|e| ConclaveError::Mcp(format!("MCP server task failed: {}", e)))?;
    info!(?reason, "MCP server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::RawContent;

    fn text_of(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .map(|c| match c.raw {
                RawContent::Text(ref t) => t.text.to_string(),
                _ => String::new(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn args(value: serde_json::Value) -> Option<JsonObject> {
        value.as_object().cloned()
    }

    #[test]
    fn lists_get_documentation_with_required_package() {
        let tools = documentation_server().tools();
        assert_eq!(tools.len(), 1);
        let tool = &tools[0];
        assert_eq!(tool.name, "get_documentation");
        assert_eq!(
            tool.description.as_deref(),
            Some("Get documentation for a given package")
        );
        assert_eq!(tool.input_schema["required"], serde_json::json!(["package"]));
        assert_eq!(tool.input_schema["properties"]["package"]["type"], "string");
    }

    #[test]
    fn server_info_advertises_tools() {
        let info = documentation_server().get_info();
        assert_eq!(info.server_info.name, "Package Documentation Provider");
        assert!(info.capabilities.tools.is_some());
    }

    #[tokio::test]
    async fn call_returns_documentation_text() {
        let dir = tempfile::tempdir().unwrap();
        let server = documentation_server().with_working_dir(dir.path());
        let result = server
            .call("get_documentation", args(serde_json::json!({"package": "serde"})))
            .await;
        assert_ne!(result.is_error, Some(true));
        assert!(text_of(&result).starts_with("serde is a very useful package."));
    }

    #[tokio::test]
    async fn missing_package_is_an_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let server = documentation_server().with_working_dir(dir.path());
        let result = server.call("get_documentation", None).await;
        assert_eq!(result.is_error, Some(true));
        assert_eq!(
            text_of(&result),
            "Error: package parameter is required for get_documentation"
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let server = documentation_server().with_working_dir(dir.path());
        let result = server.call("get_weather", args(serde_json::json!({}))).await;
        assert_eq!(result.is_error, Some(true));
        assert_eq!(text_of(&result), "Unknown action");
    }
}
