//! Turning model replies into directives.
//!
//! A reply either asks for tools, hands control to another agent, or
//! finishes the run. Structured replies carry that as tool calls (the
//! reserved `handoff` and `finish` tools); plain text is read with the
//! line rules in [`parse_free_text`].

use std::sync::OnceLock;

use regex::Regex;
use serde_json::json;

use conclave_core::types::{ToolCall, ToolDefinition};

/// Terminal marker accepted in free text.
pub const FINISH: &str = "FINISH";
pub const HANDOFF_TOOL: &str = "handoff";
pub const FINISH_TOOL: &str = "finish";

/// What an agent asked for at the end of its turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Run these tools and call the model again.
    ToolCalls(Vec<ToolCall>),
    /// Give control to `to`, passing `message` along.
    Handoff { to: String, message: String },
    /// End the run.
    Finish { answer: String },
}

/// One `Action: <name>: <input>` line.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionLine {
    pub name: String,
    pub input: String,
}

fn action_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Action: (\w+): (.*)").expect("action regex"))
}

/// First line of `text` matching `Action: <word-chars>: <rest-of-line>`.
pub fn parse_action_line(text: &str) -> Option<ActionLine> {
    text.lines().find_map(|line| {
        action_regex().captures(line).map(|caps| ActionLine {
            name: caps[1].to_string(),
            input: caps[2].to_string(),
        })
    })
}

/// Drop a leading `Answer:` from a final reply.
pub fn strip_answer_prefix(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.rfind("Answer:") {
        Some(pos) if trimmed[..pos].trim().is_empty() || trimmed[..pos].ends_with('\n') => {
            trimmed[pos + "Answer:".len()..].trim().to_string()
        }
        _ => trimmed.to_string(),
    }
}

/// Reserved routing tools offered to an agent with the given successors.
///
/// `finish` is always offered; `handoff` only when there is somewhere to go.
pub fn routing_tools(successors: &[&str]) -> Vec<ToolDefinition> {
    let mut tools = Vec::new();
    if !successors.is_empty() {
        tools.push(ToolDefinition {
            name: HANDOFF_TOOL.to_string(),
            description: "Hand control to another agent, with a message describing the work \
                          done so far and what it should do next."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "agent": {
                        "type": "string",
                        "description": "The agent to act next",
                        "enum": successors,
                    },
                    "message": {
                        "type": "string",
                        "description": "What the next agent needs to know",
                    }
                },
                "required": ["agent"]
            }),
        });
    }
    tools.push(ToolDefinition {
        name: FINISH_TOOL.to_string(),
        description: "Finish the whole workflow with a final answer for the user.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "answer": { "type": "string", "description": "The final answer" }
            },
            "required": []
        }),
    });
    tools
}

/// Interpret a call to one of the reserved routing tools.
pub fn parse_routing_call(call: &ToolCall) -> Option<Directive> {
    let arg = |key: &str| {
        call.input
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .trim()
            .to_string()
    };
    let directive = match call.name.as_str() {
        HANDOFF_TOOL => Some(Directive::Handoff {
            to: arg("agent"),
            message: arg("message"),
        }),
        FINISH_TOOL => Some(Directive::Finish {
            answer: arg("answer"),
        }),
        _ => None,
    };
    directive.map(Directive::resolve_finish)
}

impl Directive {
    /// A hand-off addressed to `FINISH` ends the run with its message.
    pub fn resolve_finish(self) -> Self {
        match self {
            Directive::Handoff { to, message } if to.eq_ignore_ascii_case(FINISH) => {
                Directive::Finish {
                    answer: strip_answer_prefix(&message),
                }
            }
            other => other,
        }
    }
}

fn routing_prefix(line: &str) -> Option<&str> {
    ["Next:", "Handoff:", "Hand off to:"]
        .iter()
        .find_map(|p| line.strip_prefix(p))
        .map(str::trim)
}

/// A line that is one name and nothing else, ignoring markdown emphasis and
/// trailing punctuation.
fn bare_word(line: &str) -> Option<&str> {
    let word = line
        .trim()
        .trim_matches(|c: char| matches!(c, '*' | '`' | '"' | '\'' | '.' | '!'));
    let valid = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid.then_some(word)
}

fn without_line(lines: &[&str], skip: usize) -> String {
    lines
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != skip)
        .map(|(_, l)| *l)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// A line that is the finish marker alone, in any case.
fn is_finish_line(line: &str) -> bool {
    bare_word(line).is_some_and(|w| w.eq_ignore_ascii_case(FINISH))
}

/// Resolve a bare name to the successor it spells, ignoring case.
fn canonical<'a>(name: &'a str, successors: &[&'a str]) -> &'a str {
    successors
        .iter()
        .find(|s| s.eq_ignore_ascii_case(name))
        .copied()
        .unwrap_or(name)
}

/// Read a routing decision out of a plain-text reply.
///
/// Rules, first hit wins:
/// 1. a line `FINISH` (any case), or a last line starting with `FINISH`,
///    finishes;
/// 2. a line `Next: <agent>` or `Handoff: <agent>` hands off, and
///    `Next: FINISH` finishes;
/// 3. a last line holding only the name of a successor hands off to it;
/// 4. with exactly one successor the reply goes to it;
/// 5. otherwise the reply is the final answer.
///
/// The hand-off message or answer is the reply without the routing line.
/// Names after an explicit prefix are kept even when they are not
/// successors, so the route check can reject them.
pub fn parse_free_text(reply: &str, successors: &[&str]) -> Directive {
    let lines: Vec<&str> = reply.trim().lines().collect();
    let last = lines.len().saturating_sub(1);

    let finish_line = lines.iter().position(|l| is_finish_line(l)).or_else(|| {
        lines
            .last()
            .filter(|l| l.trim_start().starts_with(FINISH))
            .map(|_| last)
    });
    if let Some(i) = finish_line {
        return Directive::Finish {
            answer: strip_answer_prefix(&without_line(&lines, i)),
        };
    }

    if let Some((i, target)) = lines
        .iter()
        .enumerate()
        .find_map(|(i, l)| routing_prefix(l.trim()).map(|t| (i, t)))
    {
        let target = bare_word(target).unwrap_or(target);
        return Directive::Handoff {
            to: canonical(target, successors).to_string(),
            message: without_line(&lines, i),
        }
        .resolve_finish();
    }

    let named_successor = lines
        .last()
        .and_then(|l| bare_word(l))
        .filter(|word| successors.iter().any(|s| s.eq_ignore_ascii_case(word)));
    if let Some(word) = named_successor {
        return Directive::Handoff {
            to: canonical(word, successors).to_string(),
            message: without_line(&lines, last),
        };
    }

    let text = reply.trim().to_string();
    match successors {
        [only] => Directive::Handoff {
            to: only.to_string(),
            message: text,
        },
        _ => Directive::Finish {
            answer: strip_answer_prefix(&text),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_action_line_wins() {
        let reply = "Thought: search first\nAction: web_search: foo bar\nAction: scrape: https://x";
        assert_eq!(
            parse_action_line(reply),
            Some(ActionLine {
                name: "web_search".into(),
                input: "foo bar".into()
            })
        );
    }

    #[test]
    fn action_input_keeps_later_colons() {
        let line = parse_action_line("Action: scrape: https://example.com:8080/a").unwrap();
        assert_eq!(line.name, "scrape");
        assert_eq!(line.input, "https://example.com:8080/a");
    }

    #[test]
    fn action_must_start_the_line() {
        assert_eq!(parse_action_line("I would do Action: bash: ls"), None);
        assert_eq!(parse_action_line("Action: two words: x"), None);
        assert_eq!(parse_action_line("Answer: 42"), None);
    }

    #[test]
    fn answer_prefix_is_stripped() {
        assert_eq!(strip_answer_prefix("Answer: Four islands"), "Four islands");
        assert_eq!(
            strip_answer_prefix("Thought: done\nAnswer: 0.21 seconds"),
            "0.21 seconds"
        );
        assert_eq!(strip_answer_prefix("No prefix here"), "No prefix here");
    }

    #[test]
    fn finish_marker() {
        assert_eq!(
            parse_free_text("FINISH", &["scraper", "writer"]),
            Directive::Finish { answer: String::new() }
        );
        assert_eq!(
            parse_free_text("The report is saved.\nFINISH", &["supervisor"]),
            Directive::Finish {
                answer: "The report is saved.".into()
            }
        );
        assert_eq!(
            parse_free_text("All done.\nFINISH: report.md written", &[]),
            Directive::Finish {
                answer: "All done.".into()
            }
        );
    }

    #[test]
    fn bare_agent_name_hands_off() {
        assert_eq!(
            parse_free_text("scraper", &["scraper", "writer"]),
            Directive::Handoff {
                to: "scraper".into(),
                message: String::new()
            }
        );
        assert_eq!(
            parse_free_text("Research is needed first.\n**Scraper**", &["scraper", "writer"]),
            Directive::Handoff {
                to: "scraper".into(),
                message: "Research is needed first.".into()
            }
        );
    }

    #[test]
    fn lowercase_finish_line() {
        assert_eq!(
            parse_free_text("The report is saved.\nfinish", &["supervisor"]),
            Directive::Finish {
                answer: "The report is saved.".into()
            }
        );
        assert_eq!(
            parse_free_text("**Finish**", &["scraper", "writer"]),
            Directive::Finish { answer: String::new() }
        );
    }

    #[test]
    fn handoff_to_finish_ends_the_run() {
        assert_eq!(
            parse_free_text("All done.\nNext: FINISH", &["worker"]),
            Directive::Finish {
                answer: "All done.".into()
            }
        );
        assert_eq!(
            parse_free_text("Handoff: finish\nAnswer: 42", &["scraper", "writer"]),
            Directive::Finish {
                answer: "42".into()
            }
        );
    }

    #[test]
    fn unknown_name_after_prefix_is_kept_for_validation() {
        assert_eq!(
            parse_free_text("Next: painter", &["scraper", "writer"]),
            Directive::Handoff {
                to: "painter".into(),
                message: String::new()
            }
        );
    }

    #[test]
    fn bare_word_that_is_not_a_successor_is_content() {
        assert_eq!(
            parse_free_text("Paris.", &[]),
            Directive::Finish {
                answer: "Paris.".into()
            }
        );
        assert_eq!(
            parse_free_text("The report is complete.\n\nDone.", &["scraper", "writer"]),
            Directive::Finish {
                answer: "The report is complete.\n\nDone.".into()
            }
        );
        assert_eq!(
            parse_free_text("painter", &["supervisor"]),
            Directive::Handoff {
                to: "supervisor".into(),
                message: "painter".into()
            }
        );
    }

    #[test]
    fn next_line_hands_off_with_remaining_text() {
        assert_eq!(
            parse_free_text("Next: writer\nWrite about the summit.", &["scraper", "writer"]),
            Directive::Handoff {
                to: "writer".into(),
                message: "Write about the summit.".into()
            }
        );
    }

    #[test]
    fn single_successor_gets_the_reply() {
        assert_eq!(
            parse_free_text("Found 2 urls:\n1. https://a\n2. https://b", &["supervisor"]),
            Directive::Handoff {
                to: "supervisor".into(),
                message: "Found 2 urls:\n1. https://a\n2. https://b".into()
            }
        );
    }

    #[test]
    fn several_or_no_successors_finish() {
        let reply = "Here is the summary of the news today.";
        assert_eq!(
            parse_free_text(reply, &["scraper", "writer"]),
            Directive::Finish {
                answer: reply.into()
            }
        );
        assert_eq!(
            parse_free_text(reply, &[]),
            Directive::Finish {
                answer: reply.into()
            }
        );
    }

    #[test]
    fn routing_tool_calls() {
        let call = ToolCall {
            id: "c1".into(),
            name: HANDOFF_TOOL.into(),
            input: json!({"agent": "writer", "message": "draft it"}),
        };
        assert_eq!(
            parse_routing_call(&call),
            Some(Directive::Handoff {
                to: "writer".into(),
                message: "draft it".into()
            })
        );
        let call = ToolCall {
            id: "c2".into(),
            name: "web_search".into(),
            input: json!({}),
        };
        assert_eq!(parse_routing_call(&call), None);
    }

    #[test]
    fn handoff_call_to_finish_is_a_finish() {
        let call = ToolCall {
            id: "c3".into(),
            name: HANDOFF_TOOL.into(),
            input: json!({"agent": "FINISH", "message": "Report is in report.md"}),
        };
        assert_eq!(
            parse_routing_call(&call),
            Some(Directive::Finish {
                answer: "Report is in report.md".into()
            })
        );
        let call = ToolCall {
            id: "c4".into(),
            name: HANDOFF_TOOL.into(),
            input: json!({"agent": "finish"}),
        };
        assert_eq!(
            parse_routing_call(&call),
            Some(Directive::Finish { answer: String::new() })
        );
    }

    #[test]
    fn routing_tools_depend_on_successors() {
        let names: Vec<_> = routing_tools(&["a", "b"]).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec![HANDOFF_TOOL, FINISH_TOOL]);
        let tools = routing_tools(&[]);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, FINISH_TOOL);
        let handoff = &routing_tools(&["writer"])[0];
        assert_eq!(handoff.input_schema["properties"]["agent"]["enum"], json!(["writer"]));
    }
}
