//! Token budgeting against a model's context window.
//!
//! [`TokenCounter`] binds the capability registry to one model so the rest
//! of the assembler can ask "how big is the window" and "what does this text
//! cost" without threading the model name everywhere.

use threadline_core::capability::ModelCapabilities;
use threadline_core::error::{CapabilityError, Error, Result};

/// Capability registry view for a single model.
pub struct TokenCounter<'a> {
    capabilities: &'a dyn ModelCapabilities,
    model: &'a str,
}

impl<'a> TokenCounter<'a> {
    pub fn new(capabilities: &'a dyn ModelCapabilities, model: &'a str) -> Self {
        Self {
            capabilities,
            model,
        }
    }

    pub fn model(&self) -> &str {
        self.model
    }

    /// Total context window of the model.
    pub async fn context_window(&self) -> std::result::Result<usize, CapabilityError> {
        self.capabilities.context_window_size(self.model).await
    }

    /// Id of the estimator `estimate` uses, for validating cached sizes.
    pub async fn tokenizer(&self) -> std::result::Result<String, CapabilityError> {
        self.capabilities.tokenizer_id(self.model).await
    }

    /// Estimated token cost of `text`.
    pub async fn estimate(&self, text: &str) -> std::result::Result<usize, CapabilityError> {
        self.capabilities.estimate_tokens(self.model, text).await
    }
}

/// Tokens left for history once the reserved prompt cost is paid.
///
/// A reservation that meets or exceeds the window is a configuration error:
/// no history could ever fit, so the build must not proceed.
pub fn history_budget(model: &str, context_window: usize, reserved: usize) -> Result<usize> {
    if context_window == 0 {
        return Err(Error::Config {
            message: format!("model {model} reports a zero-token context window"),
        });
    }
    match context_window.checked_sub(reserved) {
        Some(budget) if budget > 0 => Ok(budget),
        _ => Err(Error::BudgetExhausted {
            model: model.to_string(),
            context_window,
            reserved,
        }),
    }
}
