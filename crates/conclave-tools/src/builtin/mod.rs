use std::path::{Path, PathBuf};
use std::sync::Arc;

use conclave_core::config::AppConfig;
use conclave_core::traits::Tool;

pub mod bash;
pub mod human_input;
pub mod manage_files;
pub mod ping;
pub mod scrape;
pub mod web_search;

/// Names of every builtin tool, in catalog order.
pub const BUILTIN_NAMES: [&str; 6] = [
    "ping",
    "bash",
    "web_search",
    "scrape",
    "manage_files",
    "human_input",
];

/// Instantiate a builtin tool by name.
pub fn create(name: &str, config: &AppConfig) -> Option<Arc<dyn Tool>> {
    let tool: Arc<dyn Tool> = match name {
        "ping" => Arc::new(ping::PingTool::new()),
        "bash" => Arc::new(bash::BashTool),
        "web_search" => Arc::new(web_search::WebSearchTool::from_config(
            config.web_search.as_ref(),
        )),
        "scrape" => Arc::new(scrape::ScrapeTool::from_config(config.scraper.as_ref())),
        "manage_files" => Arc::new(manage_files::ManageFilesTool),
        "human_input" => Arc::new(human_input::HumanInputTool),
        _ => return None,
    };
    Some(tool)
}

/// Resolve `p` against the working directory unless it is absolute.
pub(crate) fn resolve(p: &str, wd: &Path) -> PathBuf {
    let path = PathBuf::from(p);
    if path.is_absolute() {
        path
    } else {
        wd.join(path)
    }
}

/// Cut `text` to at most `max` bytes on a char boundary, marking the cut.
pub(crate) fn truncate(mut text: String, max: usize) -> String {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text.push_str(&format!("\n\n[truncated at {} chars]", max));
    text
}

/// RapidAPI key: configured value first, then `RAPIDAPI_KEY`.
pub(crate) fn rapidapi_key(configured: Option<&str>) -> Option<String> {
    configured
        .filter(|k| !k.is_empty() && !k.starts_with("${"))
        .map(str::to_string)
        .or_else(|| std::env::var("RAPIDAPI_KEY").ok())
}
