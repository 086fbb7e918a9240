use std::sync::OnceLock;

use futures::future::BoxFuture;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use conclave_core::config::ScraperConfig;
use conclave_core::error::{ConclaveError, Result};
use conclave_core::traits::Tool;
use conclave_core::types::{ToolContext, ToolResult};

use super::{rapidapi_key, truncate};

/// Fetches page content, through ScrapeNinja when a RapidAPI key is available
/// and directly otherwise.
pub struct ScrapeTool {
    api_key: Option<String>,
    host: String,
    max_length: usize,
    http: reqwest::Client,
}

impl ScrapeTool {
    pub fn from_config(config: Option<&ScraperConfig>) -> Self {
        let config = config.cloned().unwrap_or_else(|| ScraperConfig {
            api_key: None,
            host: "scrapeninja.p.rapidapi.com".into(),
            max_length: 30_000,
        });
        Self {
            api_key: rapidapi_key(config.api_key.as_deref()),
            host: config.host,
            max_length: config.max_length,
            http: reqwest::Client::builder()
                .user_agent("Conclave/0.3")
                .build()
                .unwrap_or_default(),
        }
    }

    async fn scrape_via_api(&self, api_key: &str, url: &str) -> Result<ToolResult> {
        let resp = self
            .http
            .post(format!("https://{}/scrape", self.host))
            .header("x-rapidapi-key", api_key)
            .header("x-rapidapi-host", &self.host)
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .map_err(|e| exec_error(format!("failed to execute request: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Ok(ToolResult::error(format!(
                "unexpected status code: {}",
                status.as_u16()
            )));
        }

        let raw = resp
            .text()
            .await
            .map_err(|e| exec_error(format!("failed to read response body: {}", e)))?;
        Ok(ToolResult::success(extract_body(raw)))
    }

    async fn scrape_direct(&self, url: &str) -> Result<ToolResult> {
        let resp = self
            .http
            .get(url)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| exec_error(format!("Request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Ok(ToolResult::error(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let is_html = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("html"));

        let body = resp
            .text()
            .await
            .map_err(|e| exec_error(format!("Failed to read response body: {}", e)))?;

        Ok(ToolResult::success(if is_html {
            strip_html_tags(&body)
        } else {
            body
        }))
    }
}

fn exec_error(message: String) -> ConclaveError {
    ConclaveError::ToolExecution {
        tool: "scrape".into(),
        message,
    }
}

/// ScrapeNinja answers `{"body": "..."}`; anything else is returned as is.
fn extract_body(raw: String) -> String {
    #[derive(Deserialize)]
    struct ScrapeResponse {
        body: String,
    }
    match serde_json::from_str::<ScrapeResponse>(&raw) {
        Ok(parsed) => parsed.body,
        Err(_) => raw,
    }
}

fn script_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("script regex"))
}

fn style_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("style regex"))
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag regex"))
}

fn blank_lines_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n(\s*\n)+").expect("blank lines regex"))
}

/// Basic HTML tag stripping.
fn strip_html_tags(html: &str) -> String {
    let cleaned = script_regex().replace_all(html, "");
    let cleaned = style_regex().replace_all(&cleaned, "");
    let text = tag_regex().replace_all(&cleaned, "");

    let text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");

    blank_lines_regex().replace_all(&text, "\n\n").trim().to_string()
}

#[derive(Deserialize)]
struct ScrapeInput {
    url: String,
}

impl Tool for ScrapeTool {
    fn name(&self) -> &str {
        "scrape"
    }

    fn description(&self) -> &str {
        "Fetch the content of a URL as text. e.g. scrape: https://www.rust-lang.org"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "The URL to scrape" }
            },
            "required": ["url"]
        })
    }

    fn text_input_key(&self) -> &str {
        "url"
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
            let params: ScrapeInput = serde_json::from_value(input)
                .map_err(|e| ConclaveError::ToolValidation(e.to_string()))?;
            let url = params.url.replace('"', "").trim().to_string();

            debug!(url = %url, via_api = self.api_key.is_some(), "Scraping URL");

            let mut result = match self.api_key.as_deref() {
                Some(key) => self.scrape_via_api(key, &url).await?,
                None => self.scrape_direct(&url).await?,
            };
            result.content = truncate(result.content, self.max_length);
            Ok(result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_body_field_or_keeps_raw() {
        assert_eq!(extract_body(r#"{"body":"<p>hi</p>"}"#.into()), "<p>hi</p>");
        assert_eq!(extract_body("plain text".into()), "plain text");
    }

    #[test]
    fn strips_scripts_and_tags() {
        let html = "<html><script>var x=1;</script><style>p{}</style><h1>Title</h1>\n\n\n\n<p>A &amp; B</p></html>";
        assert_eq!(strip_html_tags(html), "Title\n\nA & B");
    }

    #[test]
    fn patterns_compile_once() {
        let pages = ["<p>one</p>", "<script>x</script><p>two</p>", "<style>a{}</style>three"];
        let texts: Vec<_> = pages.iter().map(|p| strip_html_tags(p)).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert!(std::ptr::eq(script_regex(), script_regex()));
        assert!(std::ptr::eq(tag_regex(), tag_regex()));
    }
}
