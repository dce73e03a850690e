//! Stored message records.
//!
//! A [`StoredMessage`] is the full record the history store owns. Messages
//! link to the turn they answer through `parent_id`, which makes a chat a
//! forest of reply chains rather than a flat list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single chat message as persisted by the history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Unique message ID
    pub id: String,

    /// The chat this message belongs to
    pub chat_id: String,

    /// The message this one replies to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Who wrote the message (user or bot id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,

    /// The text content
    pub text: String,

    /// Structured content (attachments, tool calls, ...). Never interpreted here.
    #[serde(default)]
    pub payload: serde_json::Value,

    /// Language tag, e.g. "en"
    #[serde(default)]
    pub language: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    /// Create a root message (no parent) stamped with the current time.
    pub fn new(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.into(),
            parent_id: None,
            author_id: None,
            text: text.into(),
            payload: serde_json::Value::Null,
            language: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Create a message replying to `parent`, in the same chat.
    pub fn reply_to(parent: &StoredMessage, text: impl Into<String>) -> Self {
        let mut msg = Self::new(parent.chat_id.clone(), text);
        msg.parent_id = Some(parent.id.clone());
        msg.language = parent.language.clone();
        if msg.created_at <= parent.created_at {
            msg.created_at = parent.created_at + chrono::Duration::milliseconds(1);
        }
        msg
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_author(mut self, author_id: impl Into<String>) -> Self {
        self.author_id = Some(author_id.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_links_parent_and_orders_after_it() {
        let root = StoredMessage::new("chat_1", "Hello").with_language("en");
        let reply = StoredMessage::reply_to(&root, "Hi there");
        assert_eq!(reply.parent_id.as_deref(), Some(root.id.as_str()));
        assert_eq!(reply.chat_id, "chat_1");
        assert_eq!(reply.language, "en");
        assert!(reply.created_at > root.created_at);
    }

    #[test]
    fn serialization_omits_empty_references() {
        let msg = StoredMessage::new("chat_1", "Test message").with_id("m1");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("parent_id"));
        assert!(!json.contains("author_id"));

        let back: StoredMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
