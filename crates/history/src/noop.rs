//! No-op cache — disables graph caching entirely.

use async_trait::async_trait;
use threadline_core::error::CacheError;
use threadline_core::graph::HistoryGraph;
use threadline_core::history::HistoryCache;

/// A cache that stores nothing; every build hydrates from the store.
pub struct NoopCache;

#[async_trait]
impl HistoryCache for NoopCache {
    fn name(&self) -> &str {
        "none"
    }

    async fn get_graph(&self, _chat_id: &str) -> Result<Option<HistoryGraph>, CacheError> {
        Ok(None)
    }

    async fn set_graph(&self, _chat_id: &str, _graph: HistoryGraph) -> Result<(), CacheError> {
        Ok(())
    }
}
