use serde::{Deserialize, Serialize};

/// Shown in place of a reply when the provider call fails.
pub const FAILED_REPLY_TEXT: &str = "I encountered an error processing your request. Please try again.\nحدث خطأ أثناء معالجة طلبك. يرجى المحاولة مرة أخرى.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

impl Source {
    /// Title when the provider gave one, otherwise the bare uri.
    pub fn label(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.uri
        } else {
            &self.title
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub used_reasoning: bool,
    #[serde(default)]
    pub failed: bool,
}

/// A reply as returned by the dispatcher, before it becomes a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub text: String,
    pub sources: Vec<Source>,
    pub used_reasoning: bool,
    pub model: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChatFlags {
    pub reasoning: bool,
    pub search: bool,
}

/// Append-only record of one chat session.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Turns worth replaying to the provider. Failed replies are display-only.
    pub fn history(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|turn| !turn.failed)
    }

    pub fn push_user(&mut self, text: &str) -> &Turn {
        self.push(Turn {
            id: next_turn_id(),
            role: Role::User,
            text: text.to_string(),
            sources: Vec::new(),
            used_reasoning: false,
            failed: false,
        })
    }

    pub fn push_reply(&mut self, reply: ChatReply) -> &Turn {
        self.push(Turn {
            id: next_turn_id(),
            role: Role::Model,
            text: reply.text,
            sources: reply.sources,
            used_reasoning: reply.used_reasoning,
            failed: false,
        })
    }

    pub fn push_failure(&mut self) -> &Turn {
        self.push(Turn {
            id: next_turn_id(),
            role: Role::Model,
            text: FAILED_REPLY_TEXT.to_string(),
            sources: Vec::new(),
            used_reasoning: false,
            failed: true,
        })
    }

    fn push(&mut self, turn: Turn) -> &Turn {
        self.turns.push(turn);
        let idx = self.turns.len() - 1;
        &self.turns[idx]
    }
}

fn next_turn_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(text: &str) -> ChatReply {
        ChatReply {
            text: text.to_string(),
            sources: vec![Source {
                uri: "https://example.com/a".to_string(),
                title: String::new(),
            }],
            used_reasoning: true,
            model: "gemini-3-pro-preview".to_string(),
        }
    }

    #[test]
    fn reply_follows_user_turn() {
        let mut conversation = Conversation::new();
        conversation.push_user("what is kerning?");
        conversation.push_reply(reply("Spacing between glyph pairs."));

        let roles: Vec<Role> = conversation.turns().iter().map(|turn| turn.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Model]);
        let last = conversation.last().unwrap();
        assert!(last.used_reasoning);
        assert_eq!(last.sources[0].label(), "https://example.com/a");
    }

    #[test]
    fn failed_replies_are_kept_but_not_replayed() {
        let mut conversation = Conversation::new();
        conversation.push_user("first");
        conversation.push_failure();
        conversation.push_user("second");

        assert_eq!(conversation.len(), 3);
        let replayed: Vec<&str> = conversation
            .history()
            .map(|turn| turn.text.as_str())
            .collect();
        assert_eq!(replayed, vec!["first", "second"]);
        assert!(conversation.turns()[1].text.starts_with("I encountered an error"));
    }

    #[test]
    fn turn_ids_are_unique() {
        let mut conversation = Conversation::new();
        let first = conversation.push_user("a").id.clone();
        let second = conversation.push_user("b").id.clone();
        assert_ne!(first, second);
    }
}
