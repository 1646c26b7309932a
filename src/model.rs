use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub agent_id: String,
    pub content: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub color: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
}

impl Agent {
    /// Name shown in transcripts, with the original name appended when the agent was renamed.
    pub fn display_name(&self) -> String {
        match self.original_name.as_deref().map(str::trim) {
            Some(original) if !original.is_empty() && original != self.name => {
                format!("{} (originally {})", self.name, original)
            }
            _ => self.name.clone(),
        }
    }

    pub fn initial(&self) -> String {
        self.name
            .trim()
            .chars()
            .next()
            .map(|ch| ch.to_uppercase().collect())
            .unwrap_or_else(|| "?".to_string())
    }
}

/// Resolves message authors. A miss is not an error; callers skip the message.
pub trait AgentDirectory {
    fn resolve(&self, agent_id: &str) -> Option<&Agent>;
}

impl AgentDirectory for [Agent] {
    fn resolve(&self, agent_id: &str) -> Option<&Agent> {
        self.iter().find(|agent| agent.id == agent_id)
    }
}

impl AgentDirectory for Vec<Agent> {
    fn resolve(&self, agent_id: &str) -> Option<&Agent> {
        self.as_slice().resolve(agent_id)
    }
}

impl AgentDirectory for HashMap<String, Agent> {
    fn resolve(&self, agent_id: &str) -> Option<&Agent> {
        self.get(agent_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default)]
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

pub fn load_conversation(path: &Path) -> Result<Conversation> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read conversation: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse conversation: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: &str, name: &str) -> Agent {
        Agent {
            id: id.to_string(),
            name: name.to_string(),
            color: "#3B82F6".to_string(),
            model: "llama2".to_string(),
            original_name: None,
        }
    }

    #[test]
    fn resolves_agents_from_slice_and_map() {
        let agents = vec![agent("a1", "Alice"), agent("b1", "Bob")];
        assert_eq!(agents.resolve("b1").map(|a| a.name.as_str()), Some("Bob"));
        assert!(agents.resolve("missing").is_none());

        let map: HashMap<String, Agent> = agents
            .iter()
            .map(|agent| (agent.id.clone(), agent.clone()))
            .collect();
        assert_eq!(map.resolve("a1").map(|a| a.name.as_str()), Some("Alice"));
    }

    #[test]
    fn display_name_mentions_original_name_only_when_different() {
        let mut alice = agent("a1", "Alice");
        assert_eq!(alice.display_name(), "Alice");
        alice.original_name = Some("Alice".to_string());
        assert_eq!(alice.display_name(), "Alice");
        alice.original_name = Some("Assistant".to_string());
        assert_eq!(alice.display_name(), "Alice (originally Assistant)");
    }

    #[test]
    fn initial_is_uppercase_first_letter() {
        assert_eq!(agent("a", "bob").initial(), "B");
        assert_eq!(agent("a", "  ").initial(), "?");
    }

    #[test]
    fn parses_camel_case_conversation() {
        let json = r##"{
            "agents": [{"id": "a1", "name": "Alice", "color": "#fff", "model": "m", "originalName": "A"}],
            "messages": [{"id": "m1", "agentId": "a1", "content": "hi", "timestamp": "2024-01-01T00:00:00Z"}]
        }"##;
        let conversation: Conversation = serde_json::from_str(json).expect("parse");
        assert_eq!(conversation.agents[0].original_name.as_deref(), Some("A"));
        assert_eq!(conversation.messages[0].agent_id, "a1");
    }
}
