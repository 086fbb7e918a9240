use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use conclave_core::error::{ConclaveError, Result};
use conclave_core::traits::Tool;
use conclave_core::types::{ToolContext, ToolResult};

/// Measures HTTP round-trip time to a host.
pub struct PingTool {
    http: reqwest::Client,
}

impl PingTool {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for PingTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct PingInput {
    host: String,
}

fn with_scheme(host: &str) -> String {
    let host = host.trim();
    if host.starts_with("https://") || host.starts_with("http://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

impl Tool for PingTool {
    fn name(&self) -> &str {
        "ping"
    }

    fn description(&self) -> &str {
        "Request a website and return the response time in seconds. e.g. ping: example.com"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "host": { "type": "string", "description": "Host name or URL" }
            },
            "required": ["host"]
        })
    }

    fn text_input_key(&self) -> &str {
        "host"
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let params: PingInput = serde_json::from_value(input)
                .map_err(|e| ConclaveError::ToolValidation(e.to_string()))?;
            let url = with_scheme(&params.host);

            debug!(url = %url, "Pinging");

            let start = Instant::now();
            self.http
                .get(&url)
                .timeout(Duration::from_secs(20))
                .send()
                .await
                .map_err(|e| ConclaveError::ToolExecution {
                    tool: "ping".into(),
                    message: e.to_string(),
                })?;
            let secs = start.elapsed().as_secs_f64();

            Ok(ToolResult::success(format!("{:.2} seconds", secs)))
        })
    }
}
