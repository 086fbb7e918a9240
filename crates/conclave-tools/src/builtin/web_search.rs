use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use conclave_core::config::WebSearchConfig;
use conclave_core::error::{ConclaveError, Result};
use conclave_core::traits::Tool;
use conclave_core::types::{ToolContext, ToolResult};

use super::rapidapi_key;

const DEFAULT_HOST: &str = "duckduckgo8.p.rapidapi.com";

/// Web search through the RapidAPI DuckDuckGo endpoint. Returns result URLs only.
pub struct WebSearchTool {
    api_key: Option<String>,
    host: String,
    max_results: usize,
    http: reqwest::Client,
}

impl WebSearchTool {
    pub fn from_config(config: Option<&WebSearchConfig>) -> Self {
        Self {
            api_key: rapidapi_key(config.map(|c| c.api_key.as_str())),
            host: config
                .map(|c| c.host.clone())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            max_results: config.map(|c| c.max_results).unwrap_or(2),
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct WebSearchInput {
    query: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    url: String,
}

/// Numbered URL list, at most `max` entries.
fn format_results(hits: &[SearchHit], max: usize) -> String {
    hits.iter()
        .take(max)
        .enumerate()
        .map(|(i, hit)| format!("{}. {}", i + 1, hit.url))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return the urls of search results. e.g. web_search: capital of Portugal"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search query" }
            },
            "required": ["query"]
        })
    }

    fn text_input_key(&self) -> &str {
        "query"
    }

    fn timeout_secs(&self) -> u64 {
        60
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let params: WebSearchInput = serde_json::from_value(input)
                .map_err(|e| ConclaveError::ToolValidation(e.to_string()))?;
            let query = params.query.replace('"', "");

            let api_key = self.api_key.as_deref().ok_or_else(|| ConclaveError::ToolExecution {
                tool: "web_search".into(),
                message: "no RapidAPI key configured ([web_search] api_key or RAPIDAPI_KEY)"
                    .into(),
            })?;

            debug!(query = %query, "Searching the web");

            let url = format!(
                "https://{}/?q={}",
                self.host,
                urlencoding::encode(&query)
            );
            let resp = self
                .http
                .get(&url)
                .header("x-rapidapi-key", api_key)
                .header("x-rapidapi-host", &self.host)
                .send()
                .await
                .map_err(|e| ConclaveError::ToolExecution {
                    tool: "web_search".into(),
                    message: e.to_string(),
                })?;

            let status = resp.status();
            if !status.is_success() {
                return Ok(ToolResult::error(format!(
                    "unexpected status code: {}",
                    status.as_u16()
                )));
            }

            let body: SearchResponse =
                resp.json().await.map_err(|e| ConclaveError::ToolExecution {
                    tool: "web_search".into(),
                    message: format!("failed to parse response: {}", e),
                })?;

            if body.results.is_empty() {
                return Ok(ToolResult::error("No results found"));
            }

            Ok(ToolResult::success(format_results(
                &body.results,
                self.max_results,
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_numbered_urls() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"results":[{"url":"https://a"},{"url":"https://b"},{"url":"https://c"}]}"#,
        )
        .unwrap();
        assert_eq!(format_results(&body.results, 2), "1. https://a\n2. https://b");
    }

    #[test]
    fn defaults_without_config() {
        let tool = WebSearchTool::from_config(None);
        assert_eq!(tool.host, DEFAULT_HOST);
        assert_eq!(tool.max_results, 2);
    }
}
