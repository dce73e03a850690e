//! Model capability trait — context-window sizes and token estimates.

use crate::error::CapabilityError;
use async_trait::async_trait;

/// Resolves what a model can hold and how much text costs in it.
#[async_trait]
pub trait ModelCapabilities: Send + Sync {
    /// Total context-window size of the model, in tokens.
    async fn context_window_size(&self, model: &str) -> Result<usize, CapabilityError>;

    /// Estimated token count of `text` under the model's tokenizer.
    async fn estimate_tokens(&self, model: &str, text: &str) -> Result<usize, CapabilityError>;

    /// Identifies the estimator behind `estimate_tokens` for `model`.
    ///
    /// Models that share an id produce identical estimates, so cached token
    /// sizes computed under one id stay valid for every model with that id.
    async fn tokenizer_id(&self, model: &str) -> Result<String, CapabilityError> {
        Ok(model.to_string())
    }
}
