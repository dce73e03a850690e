//! Backward budget walk over a history graph.
//!
//! Starting from one message, follow parent links toward the conversation
//! root, taking each message while it still fits in the remaining budget.
//! The first message that does not fit ends the walk; it is never skipped
//! over, because the result must stay a contiguous ancestor chain.
//!
//! Pure in-memory computation: no I/O, no locks.

use std::collections::HashSet;
use threadline_core::graph::HistoryGraph;

/// Why the walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Reached a message with no parent.
    Root,
    /// The next message costs more than the remaining budget.
    BudgetExhausted,
    /// The next message is not in the graph (trimmed away, or unknown start).
    MissingNode,
    /// The next message has no computed token size.
    Unsized,
    /// The next message was already taken; the snapshot contains a loop.
    Cycle,
}

impl StopReason {
    /// Anything short of reaching a root means older history was left out.
    pub fn is_truncation(self) -> bool {
        self != Self::Root
    }
}

/// One message taken by the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkStep {
    pub id: String,
    pub tokens: usize,
}

/// Result of a walk, oldest step first.
#[derive(Debug, Clone)]
pub struct Walk {
    pub steps: Vec<WalkStep>,
    pub total_tokens: usize,
    pub stop: StopReason,
}

impl Walk {
    pub fn truncated(&self) -> bool {
        self.stop.is_truncation()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.id.as_str())
    }
}

/// Walk from `start_id` toward the root under `budget` tokens.
pub fn walk_back<'a>(graph: &'a HistoryGraph, start_id: &'a str, budget: usize) -> Walk {
    let mut remaining = budget;
    let mut steps = Vec::new();
    let mut visited: HashSet<&'a str> = HashSet::new();
    let mut cursor = Some(start_id);

    let stop = loop {
        let Some(id) = cursor else {
            break StopReason::Root;
        };
        let Some(node) = graph.get(id) else {
            break StopReason::MissingNode;
        };
        if !visited.insert(node.id.as_str()) {
            break StopReason::Cycle;
        }
        let Some(cost) = node.token_size else {
            break StopReason::Unsized;
        };
        if cost > remaining {
            break StopReason::BudgetExhausted;
        }

        remaining -= cost;
        steps.push(WalkStep {
            id: node.id.clone(),
            tokens: cost,
        });
        cursor = node.parent_id.as_deref();
    };

    steps.reverse();
    Walk {
        steps,
        total_tokens: budget - remaining,
        stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use threadline_core::graph::HistoryNode;

    fn node(id: &str, parent: Option<&str>, secs: i64, tokens: Option<usize>) -> HistoryNode {
        HistoryNode {
            id: id.into(),
            parent_id: parent.map(String::from),
            author_id: None,
            text: String::new(),
            payload: serde_json::Value::Null,
            language: "en".into(),
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            token_size: tokens,
        }
    }

    /// m1 ← m2 ← m3, 10 tokens each.
    fn chain() -> HistoryGraph {
        let mut graph = HistoryGraph::new("chat_1");
        graph.insert(node("m1", None, 1, Some(10)));
        graph.insert(node("m2", Some("m1"), 2, Some(10)));
        graph.insert(node("m3", Some("m2"), 3, Some(10)));
        graph
    }

    fn ids(walk: &Walk) -> Vec<&str> {
        walk.ids().collect()
    }

    #[test]
    fn budget_stops_before_oversized_ancestor() {
        let walk = walk_back(&chain(), "m3", 25);
        assert_eq!(ids(&walk), vec!["m2", "m3"]);
        assert_eq!(walk.total_tokens, 20);
        assert_eq!(walk.stop, StopReason::BudgetExhausted);
        assert!(walk.truncated());
    }

    #[test]
    fn reaching_root_is_not_truncation() {
        let walk = walk_back(&chain(), "m3", 35);
        assert_eq!(ids(&walk), vec!["m1", "m2", "m3"]);
        assert_eq!(walk.total_tokens, 30);
        assert_eq!(walk.stop, StopReason::Root);
        assert!(!walk.truncated());
    }

    #[test]
    fn exact_fit_includes_everything() {
        let walk = walk_back(&chain(), "m3", 30);
        assert_eq!(walk.steps.len(), 3);
        assert!(!walk.truncated());
    }

    #[test]
    fn oversized_start_yields_nothing() {
        let mut graph = HistoryGraph::new("chat_1");
        graph.insert(node("big", None, 1, Some(50)));
        let walk = walk_back(&graph, "big", 30);
        assert!(walk.steps.is_empty());
        assert_eq!(walk.total_tokens, 0);
        assert!(walk.truncated());
    }

    #[test]
    fn start_in_the_middle_ignores_later_turns() {
        let walk = walk_back(&chain(), "m2", 100);
        assert_eq!(ids(&walk), vec!["m1", "m2"]);
        assert!(!walk.truncated());
    }

    #[test]
    fn sibling_branches_are_not_followed() {
        let mut graph = chain();
        graph.insert(node("alt", Some("m1"), 4, Some(1)));
        let walk = walk_back(&graph, "m3", 100);
        assert_eq!(ids(&walk), vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn dangling_parent_is_truncation_boundary() {
        let mut graph = HistoryGraph::new("chat_1");
        graph.insert(node("m2", Some("trimmed"), 2, Some(10)));
        graph.insert(node("m3", Some("m2"), 3, Some(10)));
        let walk = walk_back(&graph, "m3", 100);
        assert_eq!(ids(&walk), vec!["m2", "m3"]);
        assert_eq!(walk.stop, StopReason::MissingNode);
        assert!(walk.truncated());
    }

    #[test]
    fn zero_cost_messages_always_fit() {
        let mut graph = HistoryGraph::new("chat_1");
        graph.insert(node("a", None, 1, Some(0)));
        graph.insert(node("b", Some("a"), 2, Some(0)));
        let walk = walk_back(&graph, "b", 1);
        assert_eq!(ids(&walk), vec!["a", "b"]);
        assert_eq!(walk.total_tokens, 0);
    }

    #[test]
    fn loop_in_snapshot_terminates() {
        let mut graph = HistoryGraph::new("chat_1");
        graph.insert(node("a", Some("b"), 1, Some(0)));
        graph.insert(node("b", Some("a"), 2, Some(0)));
        let walk = walk_back(&graph, "b", 10);
        assert_eq!(ids(&walk), vec!["a", "b"]);
        assert_eq!(walk.stop, StopReason::Cycle);
    }

    #[test]
    fn unsized_node_stops_walk() {
        let mut graph = chain();
        graph.insert(node("m2", Some("m1"), 2, None));
        let walk = walk_back(&graph, "m3", 100);
        assert_eq!(ids(&walk), vec!["m3"]);
        assert_eq!(walk.stop, StopReason::Unsized);
    }

    #[test]
    fn budget_never_exceeded_for_any_budget() {
        let mut graph = HistoryGraph::new("chat_1");
        let mut parent: Option<String> = None;
        for i in 0..30 {
            let id = format!("m{i}");
            graph.insert(node(&id, parent.as_deref(), i, Some((i as usize * 7) % 13)));
            parent = Some(id);
        }
        for budget in 0..200 {
            let walk = walk_back(&graph, "m29", budget);
            let sum: usize = walk.steps.iter().map(|s| s.tokens).sum();
            assert!(sum <= budget);
            assert_eq!(sum, walk.total_tokens);
            for pair in walk.steps.windows(2) {
                let child = graph.get(&pair[1].id).unwrap();
                assert_eq!(child.parent_id.as_deref(), Some(pair[0].id.as_str()));
            }
        }
    }
}
