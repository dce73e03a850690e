//! Error types for the Threadline domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator (store, cache, capability registry) has its own error
//! type; the top-level [`Error`] is what a context build surfaces.

use thiserror::Error;

/// The top-level error type for context assembly.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors ---
    #[error(
        "Reserved prompt cost ({reserved} tokens) leaves no history budget in the {context_window}-token window of {model}"
    )]
    BudgetExhausted {
        model: String,
        context_window: usize,
        reserved: usize,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Caller errors ---
    #[error("Start message {message_id} not found in chat {chat_id}")]
    StartMessageNotFound { chat_id: String, message_id: String },

    // --- Upstream errors ---
    #[error("History store error: {0}")]
    Store(#[from] StoreError),

    #[error("History cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Model capability error: {0}")]
    Capability(#[from] CapabilityError),

    // --- Cancellation ---
    #[error("Context build cancelled")]
    Cancelled,
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification a caller uses to pick retry, fallback or abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request can never succeed with the current model/prompt setup.
    Configuration,
    /// The request names something that does not exist.
    InvalidRequest,
    /// A collaborator failed; retrying later may succeed.
    UpstreamUnavailable,
    /// The caller abandoned the build.
    Cancelled,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BudgetExhausted { .. } | Self::Config { .. } => ErrorKind::Configuration,
            Self::Capability(CapabilityError::UnknownModel(_)) => ErrorKind::Configuration,
            Self::StartMessageNotFound { .. } => ErrorKind::InvalidRequest,
            Self::Store(_) | Self::Cache(_) | Self::Capability(_) => {
                ErrorKind::UpstreamUnavailable
            }
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Only upstream failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::UpstreamUnavailable
    }
}

// --- Collaborator errors ---

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Snapshot encoding failed: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Capability registry unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_error_displays_correctly() {
        let err = Error::BudgetExhausted {
            model: "openai/gpt-4o".into(),
            context_window: 128_000,
            reserved: 130_000,
        };
        assert!(err.to_string().contains("130000"));
        assert!(err.to_string().contains("openai/gpt-4o"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!err.is_retryable());
    }

    #[test]
    fn upstream_errors_are_retryable() {
        let store: Error = StoreError::QueryFailed("connection reset".into()).into();
        let cache: Error = CacheError::Unavailable("redis down".into()).into();
        let registry: Error = CapabilityError::Unavailable("timeout".into()).into();
        for err in [store, cache, registry] {
            assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn unknown_model_is_configuration() {
        let err: Error = CapabilityError::UnknownModel("acme/tiny".into()).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("acme/tiny"));
    }

    #[test]
    fn missing_start_is_invalid_request() {
        let err = Error::StartMessageNotFound {
            chat_id: "chat_1".into(),
            message_id: "msg_9".into(),
        };
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(!err.is_retryable());
    }
}
