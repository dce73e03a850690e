//! History store and history cache traits.
//!
//! The store is the durable source of truth for every message in a chat.
//! The cache holds one trimmed [`HistoryGraph`] snapshot per chat and is
//! accessed only as a whole: read the snapshot, replace the snapshot.
//! There is deliberately no per-entry update operation.

use crate::error::{CacheError, StoreError};
use crate::graph::HistoryGraph;
use crate::message::StoredMessage;
use async_trait::async_trait;
use std::collections::HashSet;

/// The durable message store.
///
/// Implementations: SQLite, in-memory (for testing and ephemeral chats).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// The newest `limit` messages of a chat, returned oldest first.
    async fn list_recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<StoredMessage>, StoreError>;

    /// Full records for an explicit id set, in no particular order.
    /// Unknown ids are silently absent from the result.
    async fn list_messages_by_ids(
        &self,
        ids: &HashSet<String>,
    ) -> std::result::Result<Vec<StoredMessage>, StoreError>;

    /// Persist a new message (or replace one with the same id).
    async fn append(&self, message: StoredMessage) -> std::result::Result<(), StoreError>;
}

/// Whole-snapshot cache of per-chat history graphs.
///
/// Implementations: in-memory (optional TTL), file snapshots, none (no-op).
/// Eviction is entirely up to the implementation; callers treat a miss as
/// normal at any time.
#[async_trait]
pub trait HistoryCache: Send + Sync {
    /// The backend name (e.g., "in_memory", "file", "none").
    fn name(&self) -> &str;

    /// Read the chat's snapshot, if one is cached.
    async fn get_graph(&self, chat_id: &str)
    -> std::result::Result<Option<HistoryGraph>, CacheError>;

    /// Replace the chat's snapshot.
    async fn set_graph(
        &self,
        chat_id: &str,
        graph: HistoryGraph,
    ) -> std::result::Result<(), CacheError>;
}
