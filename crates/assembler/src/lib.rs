//! Bounded conversation-context assembly.
//!
//! Given a chat's parent-linked message history and a target model, selects
//! the longest run of most-recent ancestor messages that fits the model's
//! window after the system prompt and tool schemas are paid for.
//!
//! | Stage | Module | Notes |
//! |-------|--------|-------|
//! | Budget | [`budget`] | window − reserved, must stay positive |
//! | Graph + backfill | [`assembler`] | whole-snapshot cache protocol |
//! | Walk | [`walk`] | pure, stops at the first message that does not fit |
//! | Hydrate | [`assembler`] | full records from the store, oldest first |

pub mod assembler;
pub mod budget;
pub mod walk;

pub use assembler::ContextAssembler;
pub use budget::{TokenCounter, history_budget};
pub use walk::{StopReason, Walk, WalkStep, walk_back};

pub use tokio_util::sync::CancellationToken;
