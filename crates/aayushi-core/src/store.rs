//! The local conversation store.
//!
//! Owns the ordered Conversation Set and the active conversation id. Every
//! mutation builds the next set, persists it, and only then replaces the
//! in-memory copy, so a failed write leaves both sides unchanged.

use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::storage::Storage;
use crate::types::{derive_title, Conversation, Message, Role, DEFAULT_TITLE};

/// Storage key holding the JSON-serialized Conversation Set.
pub const CONVERSATIONS_KEY: &str = "aayushi_chats";

pub struct ConversationStore {
    storage: Arc<dyn Storage>,
    conversations: Vec<Conversation>,
    active_id: Option<String>,
}

impl ConversationStore {
    /// Read the persisted Conversation Set once.
    ///
    /// A missing key means no history. A value that fails to read or parse is
    /// logged and ignored; the next mutation overwrites it. User messages left
    /// without a reply get an empty truncated placeholder so the conversation
    /// accepts new messages again.
    pub async fn load(storage: Arc<dyn Storage>) -> Self {
        let mut conversations = match storage.get(CONVERSATIONS_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Conversation>>(&raw) {
                Ok(conversations) => conversations,
                Err(e) => {
                    log::warn!("Discarding unreadable conversation history: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("Failed to read conversation history: {}", e);
                Vec::new()
            }
        };

        for conversation in &mut conversations {
            let filled = conversation.fill_unanswered();
            if filled > 0 {
                log::warn!("[{}] Filled {} unanswered turns", conversation.id, filled);
            }
        }

        let active_id = conversations.first().map(|c| c.id.clone());
        log::debug!("Loaded {} conversations", conversations.len());

        Self {
            storage,
            conversations,
            active_id,
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn get(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    /// Create a conversation at the front of the set and make it active.
    pub async fn create_conversation(&mut self, title: Option<&str>) -> Result<String> {
        let conversation = Conversation::new(title.unwrap_or(DEFAULT_TITLE));
        let id = conversation.id.clone();

        let mut next = self.conversations.clone();
        next.insert(0, conversation);
        self.commit(next).await?;

        self.active_id = Some(id.clone());
        log::info!("[{}] Conversation created", id);
        Ok(id)
    }

    pub fn select_conversation(&mut self, conversation_id: &str) -> Result<()> {
        if self.get(conversation_id).is_none() {
            return Err(StoreError::ConversationNotFound(conversation_id.to_string()));
        }
        self.active_id = Some(conversation_id.to_string());
        Ok(())
    }

    pub async fn rename_conversation(&mut self, conversation_id: &str, title: &str) -> Result<()> {
        let mut next = self.conversations.clone();
        let conversation = find_mut(&mut next, conversation_id)?;
        conversation.title = title.trim().to_string();
        self.commit(next).await
    }

    /// Append a message, enforcing the user/assistant alternation.
    ///
    /// Returns the id of the appended message. The first user message of a
    /// conversation still carrying the default title renames it.
    pub async fn append_message(
        &mut self,
        conversation_id: &str,
        message: Message,
    ) -> Result<String> {
        let mut next = self.conversations.clone();
        let conversation = find_mut(&mut next, conversation_id)?;

        let expected = if conversation.messages.len() % 2 == 0 {
            Role::User
        } else {
            Role::Assistant
        };
        if message.role != expected {
            return Err(StoreError::InvalidSequence(format!(
                "expected a {:?} message after {} messages in conversation {}",
                expected,
                conversation.messages.len(),
                conversation_id
            )));
        }

        if message.role == Role::User && conversation.title == DEFAULT_TITLE {
            conversation.title = derive_title(&message.content);
        }

        let message_id = message.id.clone();
        conversation.messages.push(message);
        self.commit(next).await?;
        Ok(message_id)
    }

    /// Concatenate a streamed chunk onto the assistant message `message_id`.
    pub async fn append_chunk(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        chunk: &str,
    ) -> Result<()> {
        let mut next = self.conversations.clone();
        let message = find_assistant_mut(&mut next, conversation_id, message_id)?;
        message.content.push_str(chunk);
        self.commit(next).await
    }

    /// Flag an assistant message whose stream ended early.
    pub async fn mark_truncated(&mut self, conversation_id: &str, message_id: &str) -> Result<()> {
        let mut next = self.conversations.clone();
        let message = find_assistant_mut(&mut next, conversation_id, message_id)?;
        message.truncated = true;
        self.commit(next).await
    }

    /// Remove a conversation.
    ///
    /// Deleting the active conversation moves the active id to the first
    /// remaining conversation, or clears it when none remain.
    pub async fn delete_conversation(&mut self, conversation_id: &str) -> Result<()> {
        if self.get(conversation_id).is_none() {
            return Err(StoreError::ConversationNotFound(conversation_id.to_string()));
        }

        let next: Vec<Conversation> = self
            .conversations
            .iter()
            .filter(|c| c.id != conversation_id)
            .cloned()
            .collect();
        self.commit(next).await?;

        if self.active_id.as_deref() == Some(conversation_id) {
            self.active_id = self.conversations.first().map(|c| c.id.clone());
        }
        log::info!("[{}] Conversation deleted", conversation_id);
        Ok(())
    }

    pub async fn clear_all(&mut self) -> Result<()> {
        self.commit(Vec::new()).await?;
        self.active_id = None;
        log::info!("Conversation history cleared");
        Ok(())
    }

    async fn commit(&mut self, next: Vec<Conversation>) -> Result<()> {
        if next.is_empty() {
            self.storage.remove(CONVERSATIONS_KEY).await?;
        } else {
            let json = serde_json::to_string(&next)?;
            self.storage.set(CONVERSATIONS_KEY, &json).await?;
        }
        self.conversations = next;
        Ok(())
    }
}

fn find_mut<'a>(
    conversations: &'a mut [Conversation],
    conversation_id: &str,
) -> Result<&'a mut Conversation> {
    conversations
        .iter_mut()
        .find(|c| c.id == conversation_id)
        .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.to_string()))
}

fn find_assistant_mut<'a>(
    conversations: &'a mut [Conversation],
    conversation_id: &str,
    message_id: &str,
) -> Result<&'a mut Message> {
    let conversation = find_mut(conversations, conversation_id)?;
    match conversation.message_mut(message_id) {
        Some(message) if message.role == Role::Assistant => Ok(message),
        _ => Err(StoreError::MessageNotFound(message_id.to_string())),
    }
}
