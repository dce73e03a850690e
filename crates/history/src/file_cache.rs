//! File-based graph cache — one JSON snapshot per chat.
//!
//! Storage location: `~/.threadline/cache/<chat>.json`
//!
//! Each write serializes the whole graph to a temporary file in the same
//! directory and renames it over the previous snapshot, so readers see
//! either the old snapshot or the new one and never a torn file.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use threadline_core::error::CacheError;
use threadline_core::graph::HistoryGraph;
use threadline_core::history::HistoryCache;
use tracing::{debug, warn};
use uuid::Uuid;

/// A directory of per-chat JSON graph snapshots.
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Create a cache rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default directory: `~/.threadline/cache`
    pub fn default_dir() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".threadline").join("cache")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot path for a chat. Anything outside `[A-Za-z0-9_-]` is
    /// percent-encoded so chat ids can never escape the cache directory.
    fn snapshot_path(&self, chat_id: &str) -> PathBuf {
        let mut name = String::with_capacity(chat_id.len() + 5);
        for byte in chat_id.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
                name.push(byte as char);
            } else {
                name.push_str(&format!("%{byte:02X}"));
            }
        }
        name.push_str(".json");
        self.dir.join(name)
    }

    /// Evict a chat's snapshot. Returns true if one existed.
    pub async fn invalidate(&self, chat_id: &str) -> Result<bool, CacheError> {
        match tokio::fs::remove_file(self.snapshot_path(chat_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Unavailable(format!(
                "Failed to remove snapshot: {e}"
            ))),
        }
    }
}

#[async_trait]
impl HistoryCache for FileCache {
    fn name(&self) -> &str {
        "file"
    }

    async fn get_graph(&self, chat_id: &str) -> Result<Option<HistoryGraph>, CacheError> {
        let path = self.snapshot_path(chat_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::Unavailable(format!(
                    "Failed to read snapshot {}: {e}",
                    path.display()
                )));
            }
        };

        match serde_json::from_str::<HistoryGraph>(&content) {
            Ok(graph) if graph.chat_id == chat_id => Ok(Some(graph)),
            Ok(graph) => {
                warn!(chat_id, found = %graph.chat_id, "Snapshot belongs to another chat, ignoring");
                Ok(None)
            }
            Err(e) => {
                warn!(chat_id, error = %e, "Skipping corrupted history snapshot");
                Ok(None)
            }
        }
    }

    async fn set_graph(&self, chat_id: &str, graph: HistoryGraph) -> Result<(), CacheError> {
        let json = serde_json::to_vec(&graph)
            .map_err(|e| CacheError::Encoding(format!("Failed to serialize graph: {e}")))?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            CacheError::Unavailable(format!("Failed to create cache directory: {e}"))
        })?;

        let path = self.snapshot_path(chat_id);
        let tmp = self.dir.join(format!(".{}.tmp", Uuid::new_v4()));
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| CacheError::Unavailable(format!("Failed to write snapshot: {e}")))?;

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::Unavailable(format!(
                "Failed to replace snapshot: {e}"
            )));
        }

        debug!(chat_id, entries = graph.len(), bytes = json.len(), "History snapshot written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadline_core::message::StoredMessage;

    fn graph(chat_id: &str) -> HistoryGraph {
        let root = StoredMessage::new(chat_id, "hello").with_id("m1");
        let reply = StoredMessage::reply_to(&root, "hi").with_id("m2");
        let mut graph = HistoryGraph::from_messages(chat_id, &[root, reply], 100);
        graph.set_token_size("m1", 2);
        graph.set_token_size("m2", 1);
        graph
    }

    #[tokio::test]
    async fn roundtrip_preserves_graph() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("cache"));

        assert!(cache.get_graph("c1").await.unwrap().is_none());

        let g = graph("c1");
        cache.set_graph("c1", g.clone()).await.unwrap();
        assert_eq!(cache.get_graph("c1").await.unwrap(), Some(g));
    }

    #[tokio::test]
    async fn overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());

        cache.set_graph("c1", graph("c1")).await.unwrap();
        cache.set_graph("c1", HistoryGraph::new("c1")).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["c1.json".to_string()]);
        assert!(cache.get_graph("c1").await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chat_ids_cannot_escape_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        let path = cache.snapshot_path("../../etc/passwd");
        assert_eq!(path.parent().unwrap(), dir.path());
        assert!(path.to_string_lossy().ends_with("%2E%2E%2F%2E%2E%2Fetc%2Fpasswd.json"));
    }

    #[tokio::test]
    async fn corrupt_snapshot_reads_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        std::fs::write(dir.path().join("c1.json"), "{not json").unwrap();
        assert!(cache.get_graph("c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalidate_removes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        cache.set_graph("c1", graph("c1")).await.unwrap();

        assert!(cache.invalidate("c1").await.unwrap());
        assert!(!cache.invalidate("c1").await.unwrap());
        assert!(cache.get_graph("c1").await.unwrap().is_none());
    }
}
