use anyhow::{Context, Result};
use serde::Serialize;

use crate::model::{Agent, AgentDirectory, Message};
use crate::timestamp::TimestampFormatter;

const UNKNOWN_AGENT: &str = "Unknown agent";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    title: &'a str,
    message_count: usize,
    messages: Vec<JsonEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonEntry<'a> {
    agent: Option<JsonAgent<'a>>,
    content: &'a str,
    timestamp: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonAgent<'a> {
    name: &'a str,
    model: &'a str,
    color: &'a str,
}

/// Literal dump of the conversation; content is not stripped.
pub fn to_json<A>(title: &str, messages: &[Message], agents: &A) -> Result<String>
where
    A: AgentDirectory + ?Sized,
{
    let entries = messages
        .iter()
        .map(|message| JsonEntry {
            agent: agents.resolve(&message.agent_id).map(|agent| JsonAgent {
                name: &agent.name,
                model: &agent.model,
                color: &agent.color,
            }),
            content: &message.content,
            timestamp: &message.timestamp,
        })
        .collect();
    let export = JsonExport {
        title,
        message_count: messages.len(),
        messages: entries,
    };
    serde_json::to_string_pretty(&export).with_context(|| "failed to serialize conversation")
}

fn speaker<A>(message: &Message, agents: &A) -> (String, Option<String>)
where
    A: AgentDirectory + ?Sized,
{
    match agents.resolve(&message.agent_id) {
        Some(agent) => (
            agent.display_name(),
            Some(agent.model.trim().to_string()).filter(|model| !model.is_empty()),
        ),
        None => (UNKNOWN_AGENT.to_string(), None),
    }
}

/// One `##` section per message, separated by horizontal rules.
pub fn to_markdown<A>(
    title: &str,
    messages: &[Message],
    agents: &A,
    formatter: &dyn TimestampFormatter,
) -> String
where
    A: AgentDirectory + ?Sized,
{
    let mut out = format!("# {}\n", title);
    let sections: Vec<String> = messages
        .iter()
        .map(|message| {
            let (name, model) = speaker(message, agents);
            let mut meta = Vec::new();
            if let Some(model) = model {
                meta.push(format!("`{}`", model));
            }
            let time = formatter.format(&message.timestamp);
            if !time.is_empty() {
                meta.push(time);
            }
            let mut section = format!("## {}\n", name);
            if !meta.is_empty() {
                section.push_str(&format!("*{}*\n", meta.join(" · ")));
            }
            section.push('\n');
            section.push_str(message.content.trim_end());
            section.push('\n');
            section
        })
        .collect();
    if !sections.is_empty() {
        out.push('\n');
        out.push_str(&sections.join("\n---\n\n"));
    }
    out
}

/// Plain numbered transcript preceded by the roster of participating agents.
pub fn to_text<A>(
    title: &str,
    messages: &[Message],
    agents: &A,
    formatter: &dyn TimestampFormatter,
) -> String
where
    A: AgentDirectory + ?Sized,
{
    let mut out = String::new();
    out.push_str(title);
    out.push('\n');
    out.push_str(&"=".repeat(title.chars().count()));
    out.push_str("\n\n");

    let roster = participants(messages, agents);
    out.push_str("Agents:\n");
    if roster.is_empty() {
        out.push_str("  (none)\n");
    }
    for agent in roster {
        if agent.model.trim().is_empty() {
            out.push_str(&format!("  - {}\n", agent.display_name()));
        } else {
            out.push_str(&format!("  - {} ({})\n", agent.display_name(), agent.model));
        }
    }

    out.push_str(&format!("\nMessages ({}):\n", messages.len()));
    for (idx, message) in messages.iter().enumerate() {
        let (name, _) = speaker(message, agents);
        let time = formatter.format(&message.timestamp);
        if time.is_empty() {
            out.push_str(&format!("\n[{}] {}:\n", idx + 1, name));
        } else {
            out.push_str(&format!("\n[{}] {} ({}):\n", idx + 1, name, time));
        }
        out.push_str(message.content.trim_end());
        out.push('\n');
    }
    out
}

/// Agents that spoke, in first-seen order, without duplicates.
fn participants<'a, A>(messages: &[Message], agents: &'a A) -> Vec<&'a Agent>
where
    A: AgentDirectory + ?Sized,
{
    let mut seen: Vec<&'a Agent> = Vec::new();
    for message in messages {
        if let Some(agent) = agents.resolve(&message.agent_id)
            && !seen.iter().any(|known| known.id == agent.id)
        {
            seen.push(agent);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::DefaultTimestampFormatter;
    use serde_json::Value;

    fn agents() -> Vec<Agent> {
        vec![
            Agent {
                id: "a".to_string(),
                name: "Alice".to_string(),
                color: "#3B82F6".to_string(),
                model: "llama2".to_string(),
                original_name: None,
            },
            Agent {
                id: "b".to_string(),
                name: "Bob".to_string(),
                color: "#10B981".to_string(),
                model: "mistral".to_string(),
                original_name: Some("Robert".to_string()),
            },
        ]
    }

    fn messages() -> Vec<Message> {
        vec![
            Message {
                id: "1".to_string(),
                agent_id: "a".to_string(),
                content: "Hello **world**".to_string(),
                timestamp: "2024-05-01T10:00:00Z".to_string(),
            },
            Message {
                id: "2".to_string(),
                agent_id: "b".to_string(),
                content: "Hi".to_string(),
                timestamp: "2024-05-01T10:01:00Z".to_string(),
            },
        ]
    }

    #[test]
    fn json_keeps_content_verbatim() {
        let json = to_json("Chat", &messages(), &agents()).expect("json");
        let value: Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(value["messageCount"], 2);
        let entries = value["messages"].as_array().expect("messages");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["agent"]["name"], "Alice");
        assert_eq!(entries[0]["agent"]["model"], "llama2");
        assert_eq!(entries[0]["content"], "Hello **world**");
        assert_eq!(entries[1]["agent"]["name"], "Bob");
        assert_eq!(entries[1]["timestamp"], "2024-05-01T10:01:00Z");
    }

    #[test]
    fn json_marks_unknown_agents_as_null() {
        let mut messages = messages();
        messages[1].agent_id = "ghost".to_string();
        let json = to_json("Chat", &messages, &agents()).expect("json");
        let value: Value = serde_json::from_str(&json).expect("parse");
        assert!(value["messages"][1]["agent"].is_null());
    }

    #[test]
    fn markdown_sections() {
        let output = to_markdown("Chat", &messages(), &agents(), &DefaultTimestampFormatter);
        insta::assert_snapshot!(output, @r"
        # Chat

        ## Alice
        *`llama2` · 2024-05-01 10:00*

        Hello **world**

        ---

        ## Bob (originally Robert)
        *`mistral` · 2024-05-01 10:01*

        Hi
        ");
    }

    #[test]
    fn text_transcript() {
        let mut messages = messages();
        messages.push(Message {
            id: "3".to_string(),
            agent_id: "a".to_string(),
            content: "Bye".to_string(),
            timestamp: "later".to_string(),
        });
        let output = to_text("Chat", &messages, &agents(), &DefaultTimestampFormatter);
        insta::assert_snapshot!(output, @r"
        Chat
        ====

        Agents:
          - Alice (llama2)
          - Bob (originally Robert) (mistral)

        Messages (3):

        [1] Alice (2024-05-01 10:00):
        Hello **world**

        [2] Bob (originally Robert) (2024-05-01 10:01):
        Hi

        [3] Alice (later):
        Bye
        ");
    }

    #[test]
    fn empty_conversation_text() {
        let output = to_text("Chat", &[], &agents(), &DefaultTimestampFormatter);
        assert!(output.contains("Agents:\n  (none)\n"));
        assert!(output.ends_with("Messages (0):\n"));
    }
}
