//! The per-chat history graph held by the cache.
//!
//! The graph is an arena: nodes live by value in a map keyed by message id
//! and refer to their parent by id. It never owns pointers, so a corrupt
//! snapshot can at worst describe a loop of ids, never an ownership cycle.
//!
//! A graph is bounded: hydration and insertion trim it to a maximum entry
//! count, keeping the newest messages by `(created_at, id)`.

use crate::message::StoredMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Default maximum number of entries kept per chat graph.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// A message as projected into the cached graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryNode {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,

    pub text: String,

    #[serde(default)]
    pub payload: serde_json::Value,

    #[serde(default)]
    pub language: String,

    pub created_at: DateTime<Utc>,

    /// Estimated token cost of `text`. `None` until computed.
    #[serde(default, deserialize_with = "token_size_or_pending")]
    pub token_size: Option<usize>,
}

/// Snapshots written by older writers mark "not computed" with a negative
/// number instead of omitting the field.
fn token_size_or_pending<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.and_then(|n| usize::try_from(n).ok()))
}

impl HistoryNode {
    /// Project a stored message into a node whose token size is pending.
    pub fn from_message(message: &StoredMessage) -> Self {
        Self {
            id: message.id.clone(),
            parent_id: message.parent_id.clone(),
            author_id: message.author_id.clone(),
            text: message.text.clone(),
            payload: message.payload.clone(),
            language: message.language.clone(),
            created_at: message.created_at,
            token_size: None,
        }
    }

    fn recency_key(&self) -> (DateTime<Utc>, &str) {
        (self.created_at, self.id.as_str())
    }
}

/// Bounded id → node map for exactly one chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryGraph {
    pub chat_id: String,
    /// Tokenizer id the stored token sizes were computed with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sized_by: Option<String>,
    #[serde(default)]
    nodes: HashMap<String, HistoryNode>,
}

impl HistoryGraph {
    /// Create an empty graph for a chat.
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            sized_by: None,
            nodes: HashMap::new(),
        }
    }

    /// Build a graph from store records, keeping at most `max_entries` of the
    /// newest. Token sizes start out pending.
    pub fn from_messages<'a, I>(chat_id: impl Into<String>, messages: I, max_entries: usize) -> Self
    where
        I: IntoIterator<Item = &'a StoredMessage>,
    {
        let mut graph = Self::new(chat_id);
        for message in messages {
            graph.insert(HistoryNode::from_message(message));
        }
        graph.trim(max_entries);
        graph
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&HistoryNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Insert or replace a node. Returns the node previously stored under the id.
    pub fn insert(&mut self, node: HistoryNode) -> Option<HistoryNode> {
        self.nodes.insert(node.id.clone(), node)
    }

    /// Drop the oldest entries until at most `max_entries` remain.
    /// Returns the number of entries removed.
    pub fn trim(&mut self, max_entries: usize) -> usize {
        if self.nodes.len() <= max_entries {
            return 0;
        }
        let excess = self.nodes.len() - max_entries;
        let mut by_age: Vec<(DateTime<Utc>, String)> = self
            .nodes
            .values()
            .map(|n| (n.created_at, n.id.clone()))
            .collect();
        by_age.sort();
        for (_, id) in by_age.into_iter().take(excess) {
            self.nodes.remove(&id);
        }
        excess
    }

    /// The chronologically latest entry (ties broken by id).
    pub fn latest(&self) -> Option<&HistoryNode> {
        self.nodes.values().max_by(|a, b| a.recency_key().cmp(&b.recency_key()))
    }

    /// The chronologically oldest entry (ties broken by id).
    pub fn oldest(&self) -> Option<&HistoryNode> {
        self.nodes.values().min_by(|a, b| a.recency_key().cmp(&b.recency_key()))
    }

    pub fn sized_by(&self) -> Option<&str> {
        self.sized_by.as_deref()
    }

    /// Switch the graph to sizes from `tokenizer`.
    ///
    /// Sizes computed by another tokenizer are discarded and become pending.
    /// Returns the number of sizes discarded.
    pub fn retokenize(&mut self, tokenizer: &str) -> usize {
        if self.sized_by.as_deref() == Some(tokenizer) {
            return 0;
        }
        self.sized_by = Some(tokenizer.to_string());
        self.nodes
            .values_mut()
            .filter_map(|n| n.token_size.take())
            .count()
    }

    /// Ids of entries whose token size has not been computed, oldest first.
    pub fn pending_token_sizes(&self) -> Vec<String> {
        let mut pending: Vec<&HistoryNode> = self
            .nodes
            .values()
            .filter(|n| n.token_size.is_none())
            .collect();
        pending.sort_by(|a, b| a.recency_key().cmp(&b.recency_key()));
        pending.into_iter().map(|n| n.id.clone()).collect()
    }

    /// Record a computed token size. Returns false if the id is unknown.
    pub fn set_token_size(&mut self, id: &str, size: usize) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.token_size = Some(size);
                true
            }
            None => false,
        }
    }
}
