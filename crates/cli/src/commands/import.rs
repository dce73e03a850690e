//! `threadline import` — Load messages into the history store.

use super::backends;
use std::path::Path;
use threadline_config::AppConfig;
use threadline_core::message::StoredMessage;
use threadline_history::HistoryRecorder;

pub async fn run(file: &Path, chat: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let count = import_file(&config, file, chat.as_deref()).await?;
    println!("📥 Imported {count} messages from {}", file.display());
    Ok(())
}

/// Parse a JSON array of messages, optionally re-homing them into `chat`.
pub fn parse_messages(
    json: &str,
    chat: Option<&str>,
) -> Result<Vec<StoredMessage>, Box<dyn std::error::Error>> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let mut messages = Vec::with_capacity(raw.len());
    for (i, mut value) in raw.into_iter().enumerate() {
        if let (Some(chat), Some(obj)) = (chat, value.as_object_mut()) {
            obj.insert("chat_id".into(), serde_json::Value::from(chat));
        }
        let message: StoredMessage = serde_json::from_value(value)
            .map_err(|e| format!("Message #{i} is invalid: {e}"))?;
        messages.push(message);
    }
    Ok(messages)
}

/// Record every message in `file` through the configured store and cache.
pub async fn import_file(
    config: &AppConfig,
    file: &Path,
    chat: Option<&str>,
) -> Result<usize, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let messages = parse_messages(&content, chat)?;

    let recorder = HistoryRecorder::new(
        backends::open_store(config).await?,
        backends::open_cache(config)?,
    )
    .with_max_entries(config.history.max_entries);

    let count = messages.len();
    for message in messages {
        recorder.record(message).await?;
    }
    tracing::debug!(count, "Import finished");
    Ok(count)
}
