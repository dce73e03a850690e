//! Context assembly pipeline — the core of Threadline.
//!
//! Builds the history context for one generation turn:
//!
//! 1. **Budget** — model window minus the reserved system-prompt and
//!    tool-schema cost (never zero or negative)
//! 2. **Graph** — the chat's cached graph, or a bounded tail hydrated from
//!    the store on a miss
//! 3. **Backfill** — token sizes for entries that lack one; the whole graph
//!    is written back when anything changed
//! 4. **Walk** — backward from the start message while the budget allows
//! 5. **Hydrate** — full records for the selected ids, oldest first
//!
//! # Cache protocol
//!
//! The cache is only ever read and written a whole snapshot at a time.
//! Two builds for the same chat may race and both write back; both derive
//! the same snapshot from the same store contents, so the last write wins
//! harmlessly.
//!
//! # Cancellation
//!
//! [`ContextAssembler::build_with_cancel`] checks the token at every
//! collaborator call. A cancelled build returns [`Error::Cancelled`] and never
//! a partial window.

use crate::budget::{self, TokenCounter};
use crate::walk::{self, Walk};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use threadline_core::capability::ModelCapabilities;
use threadline_core::context::{ContextRequest, ContextWindow, WindowMetadata};
use threadline_core::error::{Error, Result};
use threadline_core::graph::{DEFAULT_MAX_ENTRIES, HistoryGraph};
use threadline_core::history::{HistoryCache, HistoryStore};
use threadline_core::message::StoredMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ── I/O boundary ──────────────────────────────────────────────────────────

/// Wraps every collaborator call so cancellation is observed between them.
struct Boundary<'a> {
    cancel: Option<&'a CancellationToken>,
}

impl Boundary<'_> {
    async fn call<T, E, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        Error: From<E>,
    {
        match self.cancel {
            None => Ok(fut.await?),
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(Error::Cancelled),
                res = fut => Ok(res?),
            },
        }
    }
}

/// A chat graph plus how it was obtained.
struct LoadedGraph {
    graph: HistoryGraph,
    cache_hit: bool,
    backfilled: usize,
}

/// Window arithmetic for one request.
struct Sizing {
    context_window: usize,
    reserved: usize,
    budget: usize,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context assembler. Holds only injected collaborators — create one and
/// share it across requests and chats.
pub struct ContextAssembler {
    store: Arc<dyn HistoryStore>,
    cache: Arc<dyn HistoryCache>,
    capabilities: Arc<dyn ModelCapabilities>,
    max_entries: usize,
}

impl ContextAssembler {
    /// Create an assembler over the given collaborators with the default
    /// graph bound (1000 entries).
    pub fn new(
        store: Arc<dyn HistoryStore>,
        cache: Arc<dyn HistoryCache>,
        capabilities: Arc<dyn ModelCapabilities>,
    ) -> Self {
        Self {
            store,
            cache,
            capabilities,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    /// Bound the per-chat graph to `max_entries` newest messages.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Assemble the history context for a request.
    ///
    /// Empty history and truncation are normal results. Errors are
    /// configuration problems, an unknown start message, or a failing
    /// collaborator.
    pub async fn build(&self, request: &ContextRequest) -> Result<ContextWindow> {
        self.run(request, Boundary { cancel: None }).await
    }

    /// Like [`build`](Self::build), but gives up with [`Error::Cancelled`] as
    /// soon as `cancel` fires at an I/O boundary.
    pub async fn build_with_cancel(
        &self,
        request: &ContextRequest,
        cancel: &CancellationToken,
    ) -> Result<ContextWindow> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.run(request, Boundary { cancel: Some(cancel) }).await
    }

    async fn run(&self, request: &ContextRequest, io: Boundary<'_>) -> Result<ContextWindow> {
        let chat_id = request.chat_id.as_str();
        let counter = TokenCounter::new(self.capabilities.as_ref(), &request.model);

        // ── 1. Budget ──────────────────────────────────────────────────────
        let context_window = io.call(counter.context_window()).await?;
        let reserved = io.call(counter.estimate(&request.system_prompt)).await?
            + io.call(counter.estimate(&request.tool_schema)).await?;
        let budget = budget::history_budget(counter.model(), context_window, reserved)?;

        // ── 2–3. Graph + backfill ──────────────────────────────────────────
        let tokenizer = io.call(counter.tokenizer()).await?;
        let mut loaded = self.load_graph(&io, chat_id, &counter, &tokenizer).await?;
        let sizing = Sizing {
            context_window,
            reserved,
            budget,
        };

        // ── Start node ─────────────────────────────────────────────────────
        let start_id = match &request.start_message_id {
            Some(id) if loaded.graph.contains(id) => id.clone(),
            Some(id) => {
                let fresh = self.start_after_tail(&io, chat_id, id, &loaded.graph).await?;
                if fresh && loaded.cache_hit {
                    debug!(chat_id, start = %id, "Start message newer than cached graph, rehydrating");
                    loaded = self.refresh_graph(&io, chat_id, &counter, &tokenizer).await?;
                }
                if !loaded.graph.contains(id) {
                    debug!(chat_id, start = %id, "Start message outside the bounded graph");
                    return Ok(Self::empty_window(true, &sizing, &loaded));
                }
                id.clone()
            }
            None => match loaded.graph.latest() {
                Some(node) => node.id.clone(),
                None => {
                    debug!(chat_id, "Empty history");
                    return Ok(Self::empty_window(false, &sizing, &loaded));
                }
            },
        };

        // ── 4. Walk ────────────────────────────────────────────────────────
        let walk = walk::walk_back(&loaded.graph, &start_id, budget);
        debug!(
            chat_id,
            start = %start_id,
            selected = walk.steps.len(),
            tokens = walk.total_tokens,
            stop = ?walk.stop,
            "Budget walk finished"
        );

        // ── 5. Hydrate ─────────────────────────────────────────────────────
        let (messages, total_tokens, truncated) = self.hydrate_selection(&io, chat_id, &walk).await?;

        info!(
            chat_id,
            model = %request.model,
            messages = messages.len(),
            total_tokens,
            budget,
            truncated,
            cache_hit = loaded.cache_hit,
            "Context window assembled"
        );

        Ok(ContextWindow {
            messages,
            total_tokens,
            truncated,
            metadata: Self::metadata(&sizing, total_tokens, &loaded),
        })
    }

    /// Confirm a start message outside the graph exists in this chat, and
    /// report whether it is newer than the graph's oldest entry.
    ///
    /// Only a newer message can be brought in by rehydrating; an older one
    /// was trimmed out of the bounded tail and stays out.
    async fn start_after_tail(
        &self,
        io: &Boundary<'_>,
        chat_id: &str,
        start_id: &str,
        graph: &HistoryGraph,
    ) -> Result<bool> {
        let ids = HashSet::from([start_id.to_string()]);
        let found = io
            .call(self.store.list_messages_by_ids(&ids))
            .await?
            .into_iter()
            .find(|m| m.id == start_id && m.chat_id == chat_id);

        let Some(start) = found else {
            return Err(Error::StartMessageNotFound {
                chat_id: chat_id.to_string(),
                message_id: start_id.to_string(),
            });
        };

        if graph.len() < self.max_entries {
            return Ok(true);
        }
        Ok(graph.oldest().is_none_or(|oldest| {
            (start.created_at, start.id.as_str()) > (oldest.created_at, oldest.id.as_str())
        }))
    }

    // ── Graph lifecycle ───────────────────────────────────────────────────

    /// Read the chat's snapshot (hydrating on a miss), fill in missing token
    /// sizes and write the whole graph back if anything changed.
    async fn load_graph(
        &self,
        io: &Boundary<'_>,
        chat_id: &str,
        counter: &TokenCounter<'_>,
        tokenizer: &str,
    ) -> Result<LoadedGraph> {
        let cached = match io.call(self.cache.get_graph(chat_id)).await? {
            Some(graph) if graph.chat_id == chat_id => Some(graph),
            Some(graph) => {
                warn!(chat_id, found = %graph.chat_id, "Cached graph belongs to another chat, ignoring");
                None
            }
            None => None,
        };

        match cached {
            Some(mut graph) => {
                let trimmed = graph.trim(self.max_entries);
                let discarded = graph.retokenize(tokenizer);
                if discarded > 0 {
                    debug!(chat_id, discarded, tokenizer, "Cached token sizes from another tokenizer");
                }
                let backfilled = self.backfill(io, &mut graph, counter).await?;
                if trimmed > 0 || backfilled > 0 {
                    debug!(chat_id, trimmed, backfilled, "Writing refreshed graph back");
                    io.call(self.cache.set_graph(chat_id, graph.clone())).await?;
                }
                Ok(LoadedGraph {
                    graph,
                    cache_hit: true,
                    backfilled,
                })
            }
            None => self.refresh_graph(io, chat_id, counter, tokenizer).await,
        }
    }

    /// Hydrate the chat's bounded tail from the store, size every entry and
    /// replace the cached snapshot.
    async fn refresh_graph(
        &self,
        io: &Boundary<'_>,
        chat_id: &str,
        counter: &TokenCounter<'_>,
        tokenizer: &str,
    ) -> Result<LoadedGraph> {
        let messages = io
            .call(self.store.list_recent_messages(chat_id, self.max_entries))
            .await?;
        let mut graph = HistoryGraph::from_messages(chat_id, &messages, self.max_entries);
        graph.retokenize(tokenizer);
        let backfilled = self.backfill(io, &mut graph, counter).await?;

        io.call(self.cache.set_graph(chat_id, graph.clone())).await?;
        debug!(chat_id, entries = graph.len(), "Hydrated history graph from store");

        Ok(LoadedGraph {
            graph,
            cache_hit: false,
            backfilled,
        })
    }

    /// Compute token sizes for entries that lack one. Returns how many were filled.
    async fn backfill(
        &self,
        io: &Boundary<'_>,
        graph: &mut HistoryGraph,
        counter: &TokenCounter<'_>,
    ) -> Result<usize> {
        let pending = graph.pending_token_sizes();
        let mut sizes = Vec::with_capacity(pending.len());
        for id in pending {
            let Some(node) = graph.get(&id) else {
                continue;
            };
            let size = io.call(counter.estimate(&node.text)).await?;
            sizes.push((id, size));
        }

        let filled = sizes.len();
        for (id, size) in sizes {
            graph.set_token_size(&id, size);
        }
        Ok(filled)
    }

    // ── Final hydration ───────────────────────────────────────────────────

    /// Fetch full records for the walked ids, oldest first.
    ///
    /// Should the store have lost a selected message since the graph was
    /// built, only the newest run of messages that are still present is
    /// returned, so the result remains a contiguous chain.
    async fn hydrate_selection(
        &self,
        io: &Boundary<'_>,
        chat_id: &str,
        walk: &Walk,
    ) -> Result<(Vec<StoredMessage>, usize, bool)> {
        if walk.steps.is_empty() {
            return Ok((Vec::new(), 0, walk.truncated()));
        }

        let ids: HashSet<String> = walk.ids().map(String::from).collect();
        let records = io.call(self.store.list_messages_by_ids(&ids)).await?;
        let mut by_id: HashMap<String, StoredMessage> =
            records.into_iter().map(|m| (m.id.clone(), m)).collect();

        let mut messages = Vec::with_capacity(walk.steps.len());
        let mut total_tokens = 0;
        let mut truncated = walk.truncated();

        for step in walk.steps.iter().rev() {
            match by_id.remove(&step.id) {
                Some(message) => {
                    total_tokens += step.tokens;
                    messages.push(message);
                }
                None => {
                    warn!(chat_id, id = %step.id, "Selected message vanished from store, truncating");
                    truncated = true;
                    break;
                }
            }
        }

        messages.reverse();
        Ok((messages, total_tokens, truncated))
    }

    // ── Helpers ────────────────────────────────────────────────────────────

    fn empty_window(truncated: bool, sizing: &Sizing, loaded: &LoadedGraph) -> ContextWindow {
        ContextWindow {
            messages: Vec::new(),
            total_tokens: 0,
            truncated,
            metadata: Self::metadata(sizing, 0, loaded),
        }
    }

    fn metadata(sizing: &Sizing, total_tokens: usize, loaded: &LoadedGraph) -> WindowMetadata {
        WindowMetadata {
            context_window: sizing.context_window,
            reserved_tokens: sizing.reserved,
            budget: sizing.budget,
            utilization_pct: (total_tokens as f32 / sizing.budget as f32) * 100.0,
            graph_entries: loaded.graph.len(),
            cache_hit: loaded.cache_hit,
            backfilled: loaded.backfilled,
        }
    }
}
