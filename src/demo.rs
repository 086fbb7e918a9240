use conclave_core::config::{EdgeConfig, WorkflowAgentConfig, WorkflowConfig};

/// Request used by `conclave workflow` when no prompt is given.
pub const DEFAULT_REQUEST: &str = "I need a comprehensive report on something that is happening \
in the world. You can ask human for any clarifications.";

const SUPERVISOR_INSTRUCTIONS: &str = "\
You are a supervisor tasked with managing a conversation between the following workers: [scraper, writer].
Given the following user request, respond with the worker to act next.
Each worker will perform a task and respond with their results and status.
You can ask human for input anytime.

Scraper is responsible for finding and extracting information from the web.
Writer is responsible for creating a comprehensive report.

Scraper can search the web and return the urls of search results.
Using the urls, scraper can scrape the information from the web with a separate call.

Writer aggregates the information from the scraper and writes a comprehensive report.

You should not do anything else.
When finished, respond with FINISH.";

const SCRAPER_INSTRUCTIONS: &str = "\
You are the scraper agent responsible for finding and extracting information from the web.
Your role is to:
1. SEARCH for information using the web_search tool to find relevant URLs
1.1 Simply return list of urls
2. SCRAPE specific URLs from those search results using the scrape tool

IMPORTANT: After scraping, extract content of the page. Return clean text, not raw HTML.";

const WRITER_INSTRUCTIONS: &str = "\
You are the writer agent responsible for creating a comprehensive report.
Your role is to:
1. Draft the report content based on information provided by the supervisor
2. Ensure consistent tone and style throughout the document
3. Organize content with proper structure, headings, and formatting
4. Write the final report to a file in Markdown format";

fn agent(name: &str, team: &str, instructions: &str, tools: &[&str]) -> WorkflowAgentConfig {
    WorkflowAgentConfig {
        name: name.to_string(),
        team: team.to_string(),
        instructions: instructions.to_string(),
        model: None,
        tools: tools.iter().map(|t| t.to_string()).collect(),
        max_turns: None,
    }
}

fn both_ways(from: &str, to: &str) -> EdgeConfig {
    EdgeConfig {
        from: from.to_string(),
        to: to.to_string(),
        bidirectional: true,
    }
}

/// The supervisor/scraper/writer report workflow.
///
/// Keeps the step budget and cycle policy already configured.
pub fn report_workflow(base: &WorkflowConfig) -> WorkflowConfig {
    WorkflowConfig {
        max_steps: base.max_steps,
        cycle_policy: base.cycle_policy.clone(),
        leader: Some("supervisor".to_string()),
        agents: vec![
            agent("supervisor", "supervisor", SUPERVISOR_INSTRUCTIONS, &["human_input"]),
            agent("scraper", "research", SCRAPER_INSTRUCTIONS, &["web_search", "scrape"]),
            agent("writer", "document", WRITER_INSTRUCTIONS, &["manage_files"]),
        ],
        edges: vec![both_ways("supervisor", "writer"), both_ways("supervisor", "scraper")],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_agent::AgentGraph;
    use conclave_core::config::CyclePolicyConfig;
    use conclave_test_utils::config_from_toml;

    #[test]
    fn test_report_workflow_builds() {
        let mut config = config_from_toml("[model]\nmodel_id = \"gpt-4.1\"\n");
        config.workflow.cycle_policy = CyclePolicyConfig::MaxVisits(4);
        config.workflow = report_workflow(&config.workflow);
        assert_eq!(config.workflow.cycle_policy, CyclePolicyConfig::MaxVisits(4));

        let graph = AgentGraph::from_config(&config).unwrap();
        assert_eq!(graph.agent_names(), vec!["supervisor", "scraper", "writer"]);
        assert_eq!(graph.entry(), Some("supervisor"));
        assert_eq!(graph.successors("supervisor"), vec!["writer", "scraper"]);
        assert_eq!(graph.successors("writer"), vec!["supervisor"]);
        assert_eq!(graph.team_of("scraper").unwrap().name, "research");
        assert_eq!(
            graph.agent("scraper").unwrap().tools.list(),
            vec!["web_search", "scrape"]
        );
    }
}
