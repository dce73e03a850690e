//! Context window request and result types.

use crate::message::StoredMessage;
use serde::{Deserialize, Serialize};

/// Everything needed to assemble history context for one generation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRequest {
    /// The chat whose history is assembled
    pub chat_id: String,

    /// Target model; determines the window size and token estimates
    pub model: String,

    /// Walk back from this message instead of the chat's latest one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_message_id: Option<String>,

    /// Serialized system prompt (reserved before history is budgeted)
    #[serde(default)]
    pub system_prompt: String,

    /// Serialized tool schemas (reserved before history is budgeted)
    #[serde(default)]
    pub tool_schema: String,
}

impl ContextRequest {
    pub fn new(chat_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            model: model.into(),
            start_message_id: None,
            system_prompt: String::new(),
            tool_schema: String::new(),
        }
    }

    pub fn starting_at(mut self, message_id: impl Into<String>) -> Self {
        self.start_message_id = Some(message_id.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_tool_schema(mut self, schema: impl Into<String>) -> Self {
        self.tool_schema = schema.into();
        self
    }
}

/// The assembled history, ready to send alongside the next turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextWindow {
    /// Selected messages, oldest first, each the parent of the next
    pub messages: Vec<StoredMessage>,

    /// Token cost of `messages`
    pub total_tokens: usize,

    /// True when the history stops short of a conversation root
    pub truncated: bool,

    /// How the window was computed
    pub metadata: WindowMetadata,
}

impl ContextWindow {
    pub fn message_ids(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Budget and cache statistics for one build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowMetadata {
    /// Model context-window size
    pub context_window: usize,
    /// Tokens reserved for the system prompt and tool schemas
    pub reserved_tokens: usize,
    /// Tokens available for history
    pub budget: usize,
    /// History share of the budget (0.0–100.0)
    pub utilization_pct: f32,
    /// Entries in the chat graph the walk ran over
    pub graph_entries: usize,
    /// Whether the graph came from the cache without hydrating from the store
    pub cache_hit: bool,
    /// Token sizes computed during this build
    pub backfilled: usize,
}
