mod demo;
mod transcript;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use conclave_agent::{AgentGraph, SingleAgentLoop, WorkflowExecutor};
use conclave_core::config::{AppConfig, ModelConfig, RetryConfig};
use conclave_core::event::EventBus;
use conclave_core::traits::LlmClient;
use conclave_tools::{ActionDispatcher, ToolRegistry};

#[derive(Parser)]
#[command(name = "conclave", version, about = "Multi-agent workflows over tool-using LLM agents")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "conclave.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question with the single-agent ReAct loop
    Run {
        /// The question to answer
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
    },
    /// Ask the model directly, without tools or agents
    Ask {
        /// The question to ask
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
    },
    /// Run the multi-agent workflow
    Workflow {
        /// The request for the leader (defaults to the report demo request)
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
        /// Agent to start at (defaults to the configured leader)
        #[arg(long)]
        leader: Option<String>,
    },
    /// Serve the package documentation tool over MCP on stdio
    Mcp,
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("conclave=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "conclave", &mut std::io::stdout());
        return Ok(());
    }

    // The MCP server needs no model, and stdout belongs to the protocol.
    if let Commands::Mcp = &cli.command {
        conclave_mcp::serve_stdio(conclave_mcp::documentation_server()).await?;
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&redacted(&config))?);
            Ok(())
        }
        Commands::Ask { prompt } => run_ask(&config, &prompt.join(" ")).await,
        Commands::Run { prompt } => run_single(&config, &prompt.join(" ")).await,
        Commands::Workflow { prompt, leader } => {
            let request = if prompt.is_empty() {
                demo::DEFAULT_REQUEST.to_string()
            } else {
                prompt.join(" ")
            };
            run_workflow(config, &request, leader.as_deref()).await
        }
        Commands::Completions { .. } | Commands::Mcp => Ok(()),
    }
}

fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }
    if let Some(home_config) = dirs_home().map(|h| h.join(".conclave").join("config.toml")) {
        if home_config.exists() {
            info!(path = %home_config.display(), "Loading config from home directory");
            return Ok(AppConfig::load(&home_config)?);
        }
    }
    eprintln!("Warning: No config file found. Set OPENAI_API_KEY or create conclave.toml");
    Ok(create_env_config())
}

/// Minimal config when no file exists: OpenAI if a key is set, else a local Ollama.
fn create_env_config() -> AppConfig {
    let model = if std::env::var("OPENAI_API_KEY").is_ok() {
        ModelConfig::new("gpt-4.1")
    } else {
        let mut model = ModelConfig::new("llama3.2");
        model.provider = "ollama".to_string();
        model.base_url = Some("http://localhost:11434/v1/chat/completions".to_string());
        model
    };
    let web_search = std::env::var("RAPIDAPI_KEY").ok().map(|key| {
        conclave_core::config::WebSearchConfig {
            api_key: key,
            host: "duckduckgo8.p.rapidapi.com".to_string(),
            max_results: 2,
        }
    });

    AppConfig {
        agent: Default::default(),
        model,
        fallback_models: vec![],
        web_search,
        scraper: None,
        workflow: Default::default(),
    }
}

fn redacted(config: &AppConfig) -> AppConfig {
    let hide = |key: &mut Option<String>| {
        if key.is_some() {
            *key = Some("********".to_string());
        }
    };
    let mut config = config.clone();
    hide(&mut config.model.api_key);
    for model in &mut config.fallback_models {
        hide(&mut model.api_key);
    }
    if let Some(search) = &mut config.web_search {
        search.api_key = "********".to_string();
    }
    if let Some(scraper) = &mut config.scraper {
        hide(&mut scraper.api_key);
    }
    config
}

/// Primary client wrapped with retry and the fallback chain when configured.
fn build_llm(config: &AppConfig) -> anyhow::Result<Arc<dyn LlmClient>> {
    let primary = conclave_llm::create_client(&config.model)?;
    if config.fallback_models.is_empty() && config.model.retry.is_none() {
        return Ok(Arc::from(primary));
    }
    let retry_config = config.model.retry.clone().unwrap_or_else(RetryConfig::default);
    let mut fallbacks = Vec::new();
    for model in &config.fallback_models {
        fallbacks.push((model.clone(), conclave_llm::create_client(model)?));
    }
    Ok(Arc::new(conclave_llm::RetryingClient::new(
        primary,
        fallbacks,
        retry_config,
    )))
}

/// Cancel `token` on Ctrl-C or when the configured run duration elapses.
fn spawn_cancel_watch(token: CancellationToken, max_duration_secs: u64) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling run");
            }
            _ = tokio::time::sleep(Duration::from_secs(max_duration_secs)) => {
                warn!(max_duration_secs, "Run took too long, cancelling");
            }
            _ = token.cancelled() => return,
        }
        token.cancel();
    });
}

async fn run_ask(config: &AppConfig, question: &str) -> anyhow::Result<()> {
    let llm = build_llm(config)?;
    let cancel = CancellationToken::new();
    spawn_cancel_watch(cancel.clone(), config.agent.max_duration_secs);

    let result = conclave_agent::ask(llm.as_ref(), &config.model, question, &cancel).await;
    cancel.cancel();
    let answer = result?;
    println!("{}", answer);
    Ok(())
}

async fn run_single(config: &AppConfig, question: &str) -> anyhow::Result<()> {
    let llm = build_llm(config)?;
    let event_bus = Arc::new(EventBus::default());
    let workspace = config.workspace_dir();
    std::fs::create_dir_all(&workspace).ok();

    let dispatcher =
        ActionDispatcher::new(ToolRegistry::with_builtins(config)).with_events(event_bus.clone());
    let mut agent = SingleAgentLoop::new(llm, config.model.clone(), dispatcher)
        .with_max_iterations(config.agent.max_turns)
        .with_events(event_bus.clone())
        .with_working_dir(&workspace);
    if let Some(prompt) = &config.agent.system_prompt {
        agent = agent.with_system_prompt(prompt);
    }

    let cancel = agent.cancel_token();
    spawn_cancel_watch(cancel.clone(), config.agent.max_duration_secs);
    let printer = transcript::spawn_event_printer(&event_bus);

    let result = agent.run(question).await;
    cancel.cancel();
    printer.abort();

    match result {
        Ok(outcome) => {
            transcript::print_agent_outcome(&outcome);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Agent run failed");
            Err(e.into())
        }
    }
}

async fn run_workflow(
    mut config: AppConfig,
    request: &str,
    leader: Option<&str>,
) -> anyhow::Result<()> {
    if config.workflow.agents.is_empty() {
        info!("No workflow agents configured, using the report workflow");
        config.workflow = demo::report_workflow(&config.workflow);
    }

    let llm = build_llm(&config)?;
    let graph = AgentGraph::from_config(&config)?;
    let leader = match leader.or(graph.entry()) {
        Some(leader) => leader.to_string(),
        None => anyhow::bail!("workflow has no agents"),
    };
    std::fs::create_dir_all(config.workspace_dir()).ok();

    let event_bus = Arc::new(EventBus::default());
    let executor = WorkflowExecutor::from_config(&config, graph, llm).with_events(event_bus.clone());
    spawn_cancel_watch(executor.cancel_token(), config.agent.max_duration_secs);
    let printer = transcript::spawn_event_printer(&event_bus);

    transcript::print_workflow_start();
    let result = executor.execute(&leader, request).await;
    executor.cancel_token().cancel();
    // No events are published when the run is rejected up front.
    match &result {
        Ok(_) => printer.await.ok(),
        Err(_) => {
            printer.abort();
            None
        }
    };

    let result = result?;
    transcript::print_workflow(&result);
    if !result.succeeded() {
        warn!(termination = %result.termination, "Workflow did not finish");
    }
    Ok(())
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ask_joins_the_prompt() {
        let cli = Cli::try_parse_from(["conclave", "ask", "Capital", "of", "France?"]).unwrap();
        match cli.command {
            Commands::Ask { prompt } => assert_eq!(prompt.join(" "), "Capital of France?"),
            _ => panic!("expected ask"),
        }
        assert!(Cli::try_parse_from(["conclave", "ask"]).is_err());
    }

    #[test]
    fn test_mcp_takes_no_arguments() {
        let cli = Cli::try_parse_from(["conclave", "mcp"]).unwrap();
        assert!(matches!(cli.command, Commands::Mcp));
        assert!(Cli::try_parse_from(["conclave", "mcp", "extra"]).is_err());
    }
}
