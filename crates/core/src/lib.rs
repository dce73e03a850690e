//! # Threadline Core
//!
//! Domain types, traits, and error definitions for Threadline, the bounded
//! conversation-context assembler. This crate has **no backend
//! dependencies** — it defines the domain model that the other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the assembler (history store, history cache, model
//! capability registry) is a trait here. Implementations live in their
//! respective crates and are injected through constructors. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with counting/failing doubles
//! - Clean dependency graph (all crates depend inward on core)

pub mod capability;
pub mod context;
pub mod error;
pub mod graph;
pub mod history;
pub mod message;

// Re-export key types at crate root for ergonomics
pub use capability::ModelCapabilities;
pub use context::{ContextRequest, ContextWindow, WindowMetadata};
pub use error::{CacheError, CapabilityError, Error, ErrorKind, Result, StoreError};
pub use graph::{DEFAULT_MAX_ENTRIES, HistoryGraph, HistoryNode};
pub use history::{HistoryCache, HistoryStore};
pub use message::StoredMessage;
