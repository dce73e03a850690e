//! Configuration loading and validation for Threadline.
//!
//! Loads configuration from `~/.threadline/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// History store backends understood by [`HistoryConfig::store`].
pub const STORE_BACKENDS: &[&str] = &["sqlite", "memory"];

/// Graph cache backends understood by [`CacheConfig::backend`].
pub const CACHE_BACKENDS: &[&str] = &["memory", "file", "none"];

/// The root configuration structure.
///
/// Maps directly to `~/.threadline/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model used when a request does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// History store and graph bounds
    #[serde(default)]
    pub history: HistoryConfig,

    /// Graph cache backend
    #[serde(default)]
    pub cache: CacheConfig,

    /// Per-model overrides and additions to the built-in catalog
    #[serde(default)]
    pub models: BTreeMap<String, ModelOverride>,
}

fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of messages kept in a chat's cached graph
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// `sqlite` or `memory`
    #[serde(default = "default_store")]
    pub store: String,

    /// SQLite database file. Defaults to `~/.threadline/history.sqlite`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

fn default_max_entries() -> usize {
    1000
}
fn default_store() -> String {
    "sqlite".into()
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            store: default_store(),
            database_path: None,
        }
    }
}

impl HistoryConfig {
    /// Configured database path, or the default under the config directory.
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("history.sqlite"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// `memory`, `file` or `none`
    #[serde(default = "default_cache_backend")]
    pub backend: String,

    /// Snapshot lifetime in seconds; 0 keeps snapshots until replaced
    #[serde(default)]
    pub ttl_secs: u64,

    /// Snapshot directory for the `file` backend. Defaults to `~/.threadline/cache`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_cache_backend() -> String {
    "memory".into()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            ttl_secs: 0,
            dir: None,
        }
    }
}

impl CacheConfig {
    pub fn dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("cache"))
    }

    /// Snapshot lifetime, if one is configured.
    pub fn ttl(&self) -> Option<std::time::Duration> {
        (self.ttl_secs > 0).then(|| std::time::Duration::from_secs(self.ttl_secs))
    }
}

/// Context window and tokenizer ratio for one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOverride {
    pub context_window: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chars_per_token: Option<f32>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.threadline/config.toml).
    ///
    /// Environment variables take precedence over the file:
    /// - `THREADLINE_MODEL` replaces `default_model`
    /// - `THREADLINE_DATABASE` replaces `history.database_path`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("THREADLINE_MODEL").filter(|m| !m.is_empty()) {
            self.default_model = model;
        }
        if let Some(path) = lookup("THREADLINE_DATABASE").filter(|p| !p.is_empty()) {
            self.history.database_path = Some(PathBuf::from(path));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".threadline")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history.max_entries == 0 {
            return Err(ConfigError::ValidationError(
                "history.max_entries must be > 0".into(),
            ));
        }

        if !STORE_BACKENDS.contains(&self.history.store.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown history.store '{}' (expected one of: {})",
                self.history.store,
                STORE_BACKENDS.join(", ")
            )));
        }

        if !CACHE_BACKENDS.contains(&self.cache.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown cache.backend '{}' (expected one of: {})",
                self.cache.backend,
                CACHE_BACKENDS.join(", ")
            )));
        }

        for (name, model) in &self.models {
            if model.context_window == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "models.{name}.context_window must be > 0"
                )));
            }
            if let Some(ratio) = model.chars_per_token
                && (!ratio.is_finite() || ratio <= 0.0)
            {
                return Err(ConfigError::ValidationError(format!(
                    "models.{name}.chars_per_token must be > 0"
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            history: HistoryConfig::default(),
            cache: CacheConfig::default(),
            models: BTreeMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
