//! History store and graph cache implementations for Threadline.

pub mod file_cache;
pub mod memory_cache;
pub mod memory_store;
pub mod noop;
pub mod recorder;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file_cache::FileCache;
pub use memory_cache::InMemoryCache;
pub use memory_store::InMemoryStore;
pub use noop::NoopCache;
pub use recorder::HistoryRecorder;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
