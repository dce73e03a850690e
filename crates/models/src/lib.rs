//! Model capability catalog for Threadline.
//!
//! Resolves model names to context-window sizes and estimates token counts
//! with a per-model characters-per-token heuristic. Custom entries can be
//! added at runtime from TOML config.

pub mod catalog;
pub mod token;

pub use catalog::{ModelCatalog, ModelSpec};
pub use token::{DEFAULT_CHARS_PER_TOKEN, estimate_tokens};
