use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title given to a conversation created before its first message.
pub const DEFAULT_TITLE: &str = "New Chat";

const TITLE_MAX_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A web citation attached to the assistant message that used it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub title: String,
    pub href: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    #[serde(default = "generate_id")]
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    /// Set when the stream feeding this message stopped before completion.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            role: Role::User,
            content: content.into(),
            sources: None,
            truncated: false,
            created_at: Utc::now(),
        }
    }

    /// An assistant message as created at the start of a stream.
    ///
    /// An empty source list is stored as `None` so transcripts without web
    /// context carry no `sources` field at all.
    pub fn assistant(content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            id: generate_id(),
            role: Role::Assistant,
            content: content.into(),
            sources: if sources.is_empty() { None } else { Some(sources) },
            truncated: false,
            created_at: Utc::now(),
        }
    }

    /// Empty, truncated assistant message standing in for a reply that never arrived.
    pub fn unanswered() -> Self {
        let mut message = Self::assistant("", Vec::new());
        message.truncated = true;
        message
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    #[serde(alias = "chatId")]
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            title: title.into(),
            messages: Vec::new(),
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn message_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }

    /// Give every user message that lacks a reply an [`Message::unanswered`]
    /// placeholder. Returns the number of placeholders inserted.
    pub fn fill_unanswered(&mut self) -> usize {
        let mut repaired = Vec::with_capacity(self.messages.len());
        let mut inserted = 0;

        for message in self.messages.drain(..) {
            let awaiting_reply = repaired.len() % 2 == 1;
            if awaiting_reply && message.role == Role::User {
                repaired.push(Message::unanswered());
                inserted += 1;
            }
            repaired.push(message);
        }
        if repaired.len() % 2 == 1 && repaired.last().map(|m| m.role) == Some(Role::User) {
            repaired.push(Message::unanswered());
            inserted += 1;
        }

        self.messages = repaired;
        inserted
    }
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

/// Title for a conversation derived from its first user message.
pub fn derive_title(message: &str) -> String {
    let mut chars = message.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
