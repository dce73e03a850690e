//! SQLite history store.
//!
//! Uses a single SQLite database file with one `messages` table indexed by
//! `(chat_id, created_at)`. Timestamps are stored as fixed-width RFC 3339
//! UTC strings (microsecond precision) so text ordering equals time
//! ordering. Payloads are stored as JSON text.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use std::str::FromStr;
use threadline_core::error::StoreError;
use threadline_core::history::HistoryStore;
use threadline_core::message::StoredMessage;
use tracing::{debug, info};

/// Maximum ids bound into a single `IN (...)` query.
const ID_CHUNK: usize = 500;

const SELECT_COLUMNS: &str =
    "id, chat_id, parent_id, author_id, text, payload, language, created_at";

/// A SQLite-backed history store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite store at a file path.
    ///
    /// The database and its tables/indexes are created automatically.
    /// Pass `":memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // An in-memory database exists per connection, so pin it to one.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite history store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id          TEXT PRIMARY KEY NOT NULL,
                chat_id     TEXT NOT NULL,
                parent_id   TEXT,
                author_id   TEXT,
                text        TEXT NOT NULL,
                payload     TEXT NOT NULL DEFAULT 'null',
                language    TEXT NOT NULL DEFAULT '',
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_chat_created ON messages(chat_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chat/created_at index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn encode_time(at: &DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Parse a `StoredMessage` from a SQLite row.
    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<StoredMessage, StoreError> {
        let column = |name: &str, e: sqlx::Error| StoreError::QueryFailed(format!("{name} column: {e}"));

        let id: String = row.try_get("id").map_err(|e| column("id", e))?;
        let chat_id: String = row.try_get("chat_id").map_err(|e| column("chat_id", e))?;
        let parent_id: Option<String> = row.try_get("parent_id").map_err(|e| column("parent_id", e))?;
        let author_id: Option<String> = row.try_get("author_id").map_err(|e| column("author_id", e))?;
        let text: String = row.try_get("text").map_err(|e| column("text", e))?;
        let payload_json: String = row.try_get("payload").map_err(|e| column("payload", e))?;
        let language: String = row.try_get("language").map_err(|e| column("language", e))?;
        let created_at_str: String = row.try_get("created_at").map_err(|e| column("created_at", e))?;

        let payload = serde_json::from_str(&payload_json)
            .map_err(|e| StoreError::QueryFailed(format!("payload of {id}: {e}")))?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::QueryFailed(format!("created_at of {id}: {e}")))?;

        Ok(StoredMessage {
            id,
            chat_id,
            parent_id,
            author_id,
            text,
            payload,
            language,
            created_at,
        })
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn list_recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM messages WHERE chat_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT ?"
        );
        let rows = sqlx::query(&sql)
            .bind(chat_id)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("recent messages: {e}")))?;

        let mut messages = rows
            .iter()
            .map(Self::row_to_message)
            .collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn list_messages_by_ids(
        &self,
        ids: &HashSet<String>,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let ids: Vec<&String> = ids.iter().collect();
        let mut messages = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(ID_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("SELECT {SELECT_COLUMNS} FROM messages WHERE id IN ({placeholders})");
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id.as_str());
            }
            let rows = query
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::QueryFailed(format!("messages by id: {e}")))?;
            for row in &rows {
                messages.push(Self::row_to_message(row)?);
            }
        }

        Ok(messages)
    }

    async fn append(&self, message: StoredMessage) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&message.payload)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize payload: {e}")))?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO messages
                (id, chat_id, parent_id, author_id, text, payload, language, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.chat_id)
        .bind(&message.parent_id)
        .bind(&message.author_id)
        .bind(&message.text)
        .bind(payload)
        .bind(&message.language)
        .bind(Self::encode_time(&message.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Failed to insert message: {e}")))?;

        debug!(chat_id = %message.chat_id, id = %message.id, "Message stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn test_store() -> SqliteStore {
        SqliteStore::new(":memory:").await.unwrap()
    }

    fn msg(chat: &str, id: &str, parent: Option<&str>, secs: i64) -> StoredMessage {
        let mut m = StoredMessage::new(chat, format!("text {id}"))
            .with_id(id)
            .with_language("en")
            .with_created_at(Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap());
        m.parent_id = parent.map(String::from);
        m
    }

    #[tokio::test]
    async fn append_and_list_recent() {
        let store = test_store().await;
        store.append(msg("c1", "m1", None, 1)).await.unwrap();
        store.append(msg("c1", "m2", Some("m1"), 2)).await.unwrap();
        store.append(msg("c1", "m3", Some("m2"), 3)).await.unwrap();
        store.append(msg("c2", "x1", None, 4)).await.unwrap();

        let recent = store.list_recent_messages("c1", 2).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3"]);
        assert_eq!(recent[1].parent_id.as_deref(), Some("m2"));
    }

    #[tokio::test]
    async fn full_record_survives_roundtrip() {
        let store = test_store().await;
        let original = msg("c1", "m1", None, 1)
            .with_author("user_7")
            .with_payload(serde_json::json!({"attachments": [{"kind": "image"}]}));
        store.append(original.clone()).await.unwrap();

        let ids: HashSet<String> = ["m1".to_string()].into();
        let found = store.list_messages_by_ids(&ids).await.unwrap();
        assert_eq!(found, vec![original]);
    }

    #[tokio::test]
    async fn lookup_by_ids_ignores_unknown_and_empty() {
        let store = test_store().await;
        store.append(msg("c1", "m1", None, 1)).await.unwrap();

        let none = store.list_messages_by_ids(&HashSet::new()).await.unwrap();
        assert!(none.is_empty());

        let ids: HashSet<String> = ["m1".to_string(), "ghost".to_string()].into();
        let found = store.list_messages_by_ids(&ids).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn lookup_spans_multiple_chunks() {
        let store = test_store().await;
        let mut ids = HashSet::new();
        for i in 0..(ID_CHUNK + 20) {
            let id = format!("m{i}");
            store.append(msg("c1", &id, None, i as i64)).await.unwrap();
            ids.insert(id);
        }
        let found = store.list_messages_by_ids(&ids).await.unwrap();
        assert_eq!(found.len(), ID_CHUNK + 20);
    }

    #[tokio::test]
    async fn append_replaces_same_id() {
        let store = test_store().await;
        store.append(msg("c1", "m1", None, 1)).await.unwrap();
        store
            .append(msg("c1", "m1", None, 1).with_language("de"))
            .await
            .unwrap();

        let recent = store.list_recent_messages("c1", 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].language, "de");
    }
}
