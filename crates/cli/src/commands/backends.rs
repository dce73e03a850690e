//! Collaborator wiring from configuration.
//!
//! Turns the `[history]`, `[cache]` and `[models]` sections of the config
//! into the store, cache and capability registry the assembler runs on.

use std::sync::Arc;
use threadline_config::AppConfig;
use threadline_core::history::{HistoryCache, HistoryStore};
use threadline_history::{FileCache, InMemoryCache, InMemoryStore, NoopCache, SqliteStore};
use threadline_models::{ModelCatalog, ModelSpec};

/// Built-in catalog with config overrides applied on top.
pub fn catalog(config: &AppConfig) -> ModelCatalog {
    let mut catalog = ModelCatalog::with_defaults();
    for (name, model) in &config.models {
        let mut spec = ModelSpec::new(model.context_window);
        if let Some(ratio) = model.chars_per_token {
            spec = spec.with_chars_per_token(ratio);
        }
        catalog.insert(name.clone(), spec);
    }
    catalog
}

/// Open the configured history store.
pub async fn open_store(
    config: &AppConfig,
) -> Result<Arc<dyn HistoryStore>, Box<dyn std::error::Error>> {
    match config.history.store.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        "sqlite" => {
            let path = config.history.database_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let store = SqliteStore::new(&path.to_string_lossy()).await?;
            Ok(Arc::new(store))
        }
        other => Err(format!("Unknown history store: {other}").into()),
    }
}

/// Open the configured graph cache.
pub fn open_cache(config: &AppConfig) -> Result<Arc<dyn HistoryCache>, Box<dyn std::error::Error>> {
    match config.cache.backend.as_str() {
        "memory" => Ok(match config.cache.ttl() {
            Some(ttl) => Arc::new(InMemoryCache::with_ttl(ttl)),
            None => Arc::new(InMemoryCache::new()),
        }),
        "file" => Ok(Arc::new(FileCache::new(config.cache.dir()))),
        "none" => Ok(Arc::new(NoopCache)),
        other => Err(format!("Unknown cache backend: {other}").into()),
    }
}
