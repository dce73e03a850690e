//! In-memory history store — useful for testing and ephemeral chats.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use threadline_core::error::StoreError;
use threadline_core::history::HistoryStore;
use threadline_core::message::StoredMessage;
use tokio::sync::RwLock;

/// A history store that keeps every message in a Vec.
/// Useful for testing and chats where persistence isn't needed.
#[derive(Clone)]
pub struct InMemoryStore {
    messages: Arc<RwLock<Vec<StoredMessage>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Create a store pre-loaded with messages.
    pub fn with_messages(messages: impl IntoIterator<Item = StoredMessage>) -> Self {
        Self {
            messages: Arc::new(RwLock::new(messages.into_iter().collect())),
        }
    }

    /// Total number of stored messages across all chats.
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }

    /// Remove a message by id. Returns true if it existed.
    pub async fn remove(&self, id: &str) -> bool {
        let mut messages = self.messages.write().await;
        let len_before = messages.len();
        messages.retain(|m| m.id != id);
        messages.len() < len_before
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn list_recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let messages = self.messages.read().await;
        let mut chat: Vec<StoredMessage> = messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        chat.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

        let skip = chat.len().saturating_sub(limit);
        Ok(chat.split_off(skip))
    }

    async fn list_messages_by_ids(
        &self,
        ids: &HashSet<String>,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let messages = self.messages.read().await;
        Ok(messages
            .iter()
            .filter(|m| ids.contains(&m.id))
            .cloned()
            .collect())
    }

    async fn append(&self, message: StoredMessage) -> Result<(), StoreError> {
        let mut messages = self.messages.write().await;
        match messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => messages.push(message),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn msg(chat: &str, id: &str, secs: i64) -> StoredMessage {
        StoredMessage::new(chat, format!("text {id}"))
            .with_id(id)
            .with_created_at(Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap())
    }

    #[tokio::test]
    async fn recent_messages_are_chronological_tail() {
        let store = InMemoryStore::with_messages(vec![
            msg("c1", "m3", 3),
            msg("c1", "m1", 1),
            msg("c2", "x1", 2),
            msg("c1", "m2", 2),
        ]);

        let recent = store.list_recent_messages("c1", 2).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3"]);

        let all = store.list_recent_messages("c1", 100).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn lookup_by_ids_skips_unknown() {
        let store = InMemoryStore::with_messages(vec![msg("c1", "m1", 1), msg("c1", "m2", 2)]);
        let ids: HashSet<String> = ["m2".to_string(), "ghost".to_string()].into();

        let found = store.list_messages_by_ids(&ids).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "m2");
    }

    #[tokio::test]
    async fn append_replaces_same_id() {
        let store = InMemoryStore::new();
        store.append(msg("c1", "m1", 1)).await.unwrap();
        store
            .append(msg("c1", "m1", 1).with_language("fr"))
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
        let recent = store.list_recent_messages("c1", 10).await.unwrap();
        assert_eq!(recent[0].language, "fr");
    }

    #[tokio::test]
    async fn remove_message() {
        let store = InMemoryStore::with_messages(vec![msg("c1", "m1", 1)]);
        assert!(store.remove("m1").await);
        assert!(!store.remove("m1").await);
        assert!(store.is_empty().await);
    }
}
