//! In-memory graph cache with optional expiry.
//!
//! Snapshots are stored whole and handed out as clones, so a reader never
//! observes a graph another writer is in the middle of replacing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use threadline_core::error::CacheError;
use threadline_core::graph::HistoryGraph;
use threadline_core::history::HistoryCache;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

struct Snapshot {
    graph: HistoryGraph,
    stored_at: Instant,
}

/// A process-local cache holding one graph snapshot per chat.
#[derive(Clone)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, Snapshot>>>,
    ttl: Option<Duration>,
}

impl InMemoryCache {
    /// Create a cache whose snapshots never expire.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: None,
        }
    }

    /// Create a cache whose snapshots expire `ttl` after being written.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: Some(ttl),
        }
    }

    /// Evict a chat's snapshot. Returns true if one was cached.
    pub async fn invalidate(&self, chat_id: &str) -> bool {
        self.entries.write().await.remove(chat_id).is_some()
    }

    /// Number of cached snapshots (expired ones included until next read).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn is_expired(&self, snapshot: &Snapshot) -> bool {
        self.ttl
            .is_some_and(|ttl| snapshot.stored_at.elapsed() >= ttl)
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryCache for InMemoryCache {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get_graph(&self, chat_id: &str) -> Result<Option<HistoryGraph>, CacheError> {
        {
            let entries = self.entries.read().await;
            match entries.get(chat_id) {
                None => return Ok(None),
                Some(snapshot) if !self.is_expired(snapshot) => {
                    return Ok(Some(snapshot.graph.clone()));
                }
                Some(_) => {}
            }
        }

        // Expired: evict unless a fresher snapshot landed in between.
        let mut entries = self.entries.write().await;
        if entries.get(chat_id).is_some_and(|s| self.is_expired(s)) {
            entries.remove(chat_id);
            debug!(chat_id, "Evicted expired history snapshot");
        }
        Ok(None)
    }

    async fn set_graph(&self, chat_id: &str, graph: HistoryGraph) -> Result<(), CacheError> {
        self.entries.write().await.insert(
            chat_id.to_string(),
            Snapshot {
                graph,
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }
}
