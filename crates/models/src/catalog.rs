//! Built-in capability table for common LLM models.
//!
//! Each model has a context-window size (tokens) and a characters-per-token
//! ratio used for estimation. Entries can be added or overridden from
//! configuration.

use crate::token::{self, DEFAULT_CHARS_PER_TOKEN};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use threadline_core::capability::ModelCapabilities;
use threadline_core::error::CapabilityError;
use tracing::debug;

/// Provider prefixes tried when a model is named without one.
const PROVIDER_PREFIXES: &[&str] = &[
    "openai",
    "anthropic",
    "google",
    "mistral",
    "deepseek",
    "meta-llama",
];

/// What the catalog knows about one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Total context window in tokens.
    pub context_window: usize,
    /// Average characters per token for estimation.
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f32,
}

fn default_chars_per_token() -> f32 {
    DEFAULT_CHARS_PER_TOKEN
}

impl ModelSpec {
    /// Create a spec with the default estimation ratio.
    pub fn new(context_window: usize) -> Self {
        Self {
            context_window,
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
        }
    }

    pub fn with_chars_per_token(mut self, chars_per_token: f32) -> Self {
        self.chars_per_token = chars_per_token;
        self
    }
}

/// Model capability registry backed by a static table plus overrides.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: HashMap<String, ModelSpec>,
}

impl ModelCatalog {
    /// Create a catalog with built-in model windows.
    pub fn with_defaults() -> Self {
        let mut models = HashMap::new();

        // ── Anthropic ──────────────────────────────────────────────
        models.insert("anthropic/claude-sonnet-4".into(), ModelSpec::new(200_000));
        models.insert("anthropic/claude-opus-4".into(), ModelSpec::new(200_000));
        models.insert("anthropic/claude-3.5-sonnet".into(), ModelSpec::new(200_000));
        models.insert("anthropic/claude-3.5-haiku".into(), ModelSpec::new(200_000));
        models.insert("anthropic/claude-3-haiku".into(), ModelSpec::new(200_000));

        // ── OpenAI ─────────────────────────────────────────────────
        models.insert("openai/gpt-4o".into(), ModelSpec::new(128_000));
        models.insert("openai/gpt-4o-mini".into(), ModelSpec::new(128_000));
        models.insert("openai/gpt-4-turbo".into(), ModelSpec::new(128_000));
        models.insert("openai/gpt-3.5-turbo".into(), ModelSpec::new(16_385));
        models.insert("openai/o1".into(), ModelSpec::new(200_000));
        models.insert("openai/o1-mini".into(), ModelSpec::new(128_000));
        models.insert("openai/o3-mini".into(), ModelSpec::new(200_000));

        // ── Google ─────────────────────────────────────────────────
        models.insert("google/gemini-2.0-flash".into(), ModelSpec::new(1_048_576));
        models.insert("google/gemini-1.5-pro".into(), ModelSpec::new(2_097_152));
        models.insert("google/gemini-1.5-flash".into(), ModelSpec::new(1_048_576));

        // ── Meta (via OpenRouter) ──────────────────────────────────
        models.insert("meta-llama/llama-3.1-405b".into(), ModelSpec::new(131_072));
        models.insert("meta-llama/llama-3.1-70b".into(), ModelSpec::new(131_072));
        models.insert("meta-llama/llama-3.1-8b".into(), ModelSpec::new(131_072));

        // ── Mistral ────────────────────────────────────────────────
        models.insert("mistral/mistral-large".into(), ModelSpec::new(128_000));
        models.insert("mistral/mistral-small".into(), ModelSpec::new(32_000));
        models.insert("mistral/codestral".into(), ModelSpec::new(256_000));

        // ── DeepSeek ───────────────────────────────────────────────
        models.insert("deepseek/deepseek-v3".into(), ModelSpec::new(65_536));
        models.insert("deepseek/deepseek-r1".into(), ModelSpec::new(65_536));

        Self { models }
    }

    /// Create an empty catalog.
    pub fn empty() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// Add or replace a model entry.
    pub fn insert(&mut self, model: impl Into<String>, spec: ModelSpec) {
        self.models.insert(model.into(), spec);
    }

    /// Resolve a model name to its spec.
    ///
    /// Supports flexible matching: tries exact match first, then common
    /// provider prefixes (`gpt-4o` → `openai/gpt-4o`), then the longest
    /// bare name that prefixes the model (`gpt-4o-mini-2024-07-18` matches
    /// `gpt-4o-mini`).
    pub fn resolve(&self, model: &str) -> Option<&ModelSpec> {
        // 1. Exact match
        if let Some(spec) = self.models.get(model) {
            return Some(spec);
        }

        // 2. Known provider prefixes
        for prefix in PROVIDER_PREFIXES {
            if let Some(spec) = self.models.get(&format!("{prefix}/{model}")) {
                return Some(spec);
            }
        }

        // 3. Longest bare-name prefix
        let model_lower = model.to_lowercase();
        let bare_model = model_lower.rsplit('/').next().unwrap_or(&model_lower);

        self.models
            .iter()
            .filter_map(|(key, spec)| {
                let bare_key = key.rsplit('/').next().unwrap_or(key).to_lowercase();
                bare_model
                    .starts_with(&bare_key)
                    .then_some((bare_key.len(), spec))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, spec)| spec)
    }

    fn require(&self, model: &str) -> Result<&ModelSpec, CapabilityError> {
        self.resolve(model)
            .ok_or_else(|| CapabilityError::UnknownModel(model.to_string()))
    }

    /// List all known model names, sorted.
    pub fn models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of models in the catalog.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait]
impl ModelCapabilities for ModelCatalog {
    async fn context_window_size(&self, model: &str) -> Result<usize, CapabilityError> {
        let spec = self.require(model)?;
        debug!(model, context_window = spec.context_window, "Resolved model window");
        Ok(spec.context_window)
    }

    async fn estimate_tokens(&self, model: &str, text: &str) -> Result<usize, CapabilityError> {
        let spec = self.require(model)?;
        Ok(token::estimate_tokens(text, spec.chars_per_token))
    }

    async fn tokenizer_id(&self, model: &str) -> Result<String, CapabilityError> {
        let spec = self.require(model)?;
        Ok(format!("chars-per-token:{}", spec.chars_per_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_has_models() {
        let catalog = ModelCatalog::with_defaults();
        assert!(catalog.len() >= 20);
        assert!(!catalog.is_empty());
    }

    #[test]
    fn exact_match() {
        let catalog = ModelCatalog::with_defaults();
        let spec = catalog.resolve("anthropic/claude-sonnet-4").unwrap();
        assert_eq!(spec.context_window, 200_000);
    }

    #[test]
    fn bare_name_uses_provider_prefix() {
        let catalog = ModelCatalog::with_defaults();
        assert_eq!(catalog.resolve("gpt-4o").unwrap().context_window, 128_000);
    }

    #[test]
    fn versioned_name_matches_longest_prefix() {
        let mut catalog = ModelCatalog::empty();
        catalog.insert("openai/gpt-4o", ModelSpec::new(1_000));
        catalog.insert("openai/gpt-4o-mini", ModelSpec::new(2_000));
        let spec = catalog.resolve("gpt-4o-mini-2024-07-18").unwrap();
        assert_eq!(spec.context_window, 2_000);
    }

    #[test]
    fn unknown_model_is_none() {
        let catalog = ModelCatalog::with_defaults();
        assert!(catalog.resolve("acme/unknown-xyz").is_none());
    }

    #[test]
    fn insert_overrides_existing() {
        let mut catalog = ModelCatalog::with_defaults();
        catalog.insert("openai/gpt-4o", ModelSpec::new(8_192).with_chars_per_token(3.0));
        let spec = catalog.resolve("openai/gpt-4o").unwrap();
        assert_eq!(spec.context_window, 8_192);
        assert!((spec.chars_per_token - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn list_models_sorted() {
        let catalog = ModelCatalog::with_defaults();
        let models = catalog.models();
        assert!(models.contains(&"openai/gpt-4o".to_string()));
        assert!(models.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn capability_trait_uses_model_ratio() {
        let mut catalog = ModelCatalog::empty();
        catalog.insert("local/tiny", ModelSpec::new(4_096).with_chars_per_token(2.0));

        assert_eq!(catalog.context_window_size("local/tiny").await.unwrap(), 4_096);
        assert_eq!(catalog.estimate_tokens("local/tiny", "abcdef").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn capability_trait_rejects_unknown_model() {
        let catalog = ModelCatalog::empty();
        let err = catalog.context_window_size("nope").await.unwrap_err();
        assert!(matches!(err, CapabilityError::UnknownModel(m) if m == "nope"));
    }

    #[tokio::test]
    async fn tokenizer_id_follows_ratio() {
        let mut catalog = ModelCatalog::empty();
        catalog.insert("local/a", ModelSpec::new(4_096));
        catalog.insert("local/b", ModelSpec::new(8_192));
        catalog.insert("local/dense", ModelSpec::new(4_096).with_chars_per_token(2.5));

        let a = catalog.tokenizer_id("local/a").await.unwrap();
        assert_eq!(a, catalog.tokenizer_id("local/b").await.unwrap());
        assert_ne!(a, catalog.tokenizer_id("local/dense").await.unwrap());
        assert!(catalog.tokenizer_id("acme/none").await.is_err());
    }
}
