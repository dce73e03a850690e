//! Write path for new chat turns.
//!
//! Persists the message to the store, then, if the chat's graph is already
//! cached, folds the new node into the snapshot with a pending token size and
//! writes the whole graph back. A cold cache stays cold; the next context
//! build hydrates it from the store.

use std::sync::Arc;
use threadline_core::error::Result;
use threadline_core::graph::{DEFAULT_MAX_ENTRIES, HistoryNode};
use threadline_core::history::{HistoryCache, HistoryStore};
use threadline_core::message::StoredMessage;
use tracing::debug;

/// Appends messages to the store and keeps a warm cache snapshot current.
pub struct HistoryRecorder {
    store: Arc<dyn HistoryStore>,
    cache: Arc<dyn HistoryCache>,
    max_entries: usize,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn HistoryStore>, cache: Arc<dyn HistoryCache>) -> Self {
        Self {
            store,
            cache,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    /// Bound applied when re-trimming a cached graph after insertion.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    /// Record a new (or edited) message.
    ///
    /// Returns true if a cached snapshot was updated.
    pub async fn record(&self, message: StoredMessage) -> Result<bool> {
        let node = HistoryNode::from_message(&message);
        let chat_id = message.chat_id.clone();
        self.store.append(message).await?;

        let Some(mut graph) = self.cache.get_graph(&chat_id).await? else {
            debug!(chat_id = %chat_id, "No cached graph, skipping snapshot update");
            return Ok(false);
        };

        graph.insert(node);
        let trimmed = graph.trim(self.max_entries);
        let entries = graph.len();
        self.cache.set_graph(&chat_id, graph).await?;

        debug!(chat_id = %chat_id, entries, trimmed, "Cached graph updated with new message");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryCache, InMemoryStore};
    use threadline_core::graph::HistoryGraph;

    #[tokio::test]
    async fn cold_cache_stays_cold() {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let recorder = HistoryRecorder::new(store.clone(), cache.clone());

        let updated = recorder
            .record(StoredMessage::new("c1", "hello"))
            .await
            .unwrap();
        assert!(!updated);
        assert_eq!(store.len().await, 1);
        assert!(cache.get_graph("c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn warm_cache_gets_pending_node() {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let root = StoredMessage::new("c1", "hello").with_id("m1");
        let mut graph = HistoryGraph::from_messages("c1", [&root], 10);
        graph.set_token_size("m1", 2);
        cache.set_graph("c1", graph).await.unwrap();

        let recorder = HistoryRecorder::new(store.clone(), cache.clone());
        let reply = StoredMessage::reply_to(&root, "hi").with_id("m2");
        assert!(recorder.record(reply).await.unwrap());

        let cached = cache.get_graph("c1").await.unwrap().unwrap();
        assert_eq!(cached.len(), 2);
        assert_eq!(cached.get("m1").unwrap().token_size, Some(2));
        assert_eq!(cached.get("m2").unwrap().token_size, None);
        assert_eq!(cached.get("m2").unwrap().parent_id.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn insertion_respects_max_entries() {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let root = StoredMessage::new("c1", "one").with_id("m1");
        cache
            .set_graph("c1", HistoryGraph::from_messages("c1", [&root], 1))
            .await
            .unwrap();

        let recorder = HistoryRecorder::new(store, cache.clone()).with_max_entries(1);
        recorder
            .record(StoredMessage::reply_to(&root, "two").with_id("m2"))
            .await
            .unwrap();

        let cached = cache.get_graph("c1").await.unwrap().unwrap();
        assert_eq!(cached.len(), 1);
        assert!(cached.contains("m2"));
    }

    #[tokio::test]
    async fn zero_bound_still_keeps_newest_entry() {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let root = StoredMessage::new("c1", "one").with_id("m1");
        cache
            .set_graph("c1", HistoryGraph::from_messages("c1", [&root], 10))
            .await
            .unwrap();

        let recorder = HistoryRecorder::new(store, cache.clone()).with_max_entries(0);
        recorder
            .record(StoredMessage::reply_to(&root, "two").with_id("m2"))
            .await
            .unwrap();

        let cached = cache.get_graph("c1").await.unwrap().unwrap();
        assert_eq!(cached.len(), 1);
        assert!(cached.contains("m2"));
    }
}
