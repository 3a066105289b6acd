//! SQLite-backed document store.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::schema::{initialize_schema, is_initialized};
use super::{
    ChangeFeed, ChangeNotification, ChangeSubscription, Document, ExternalStore, Merge,
    DEFAULT_FEED_CAPACITY,
};
use crate::error::{Error, Result};

/// SQLite-backed [`ExternalStore`].
///
/// Documents are stored as JSON text in one table. Notifications cover
/// writes made through this handle only.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    feed: ChangeFeed,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;

        if !is_initialized(&conn) {
            initialize_schema(&conn)?;
            info!(path = %path.as_ref().display(), "initialized document store");
        }

        Ok(Self::from_connection(conn))
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            feed: ChangeFeed::new(DEFAULT_FEED_CAPACITY),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock connection: {}", e)))
    }

    fn read_body(conn: &Connection, key: &str) -> Result<Option<Document>> {
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|text| serde_json::from_str(&text).map_err(Error::from))
            .transpose()
    }

    /// Number of stored documents.
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[async_trait]
impl ExternalStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Document>> {
        let conn = self.lock()?;
        Self::read_body(&conn, key)
    }

    async fn upsert(&self, key: &str, merge: Merge) -> Result<Document> {
        let updated = {
            let mut conn = self.lock()?;
            let tx = conn.transaction()?;
            let current = Self::read_body(&tx, key)?.unwrap_or_else(|| json!({}));
            let updated = merge(current)?;
            tx.execute(
                "INSERT INTO documents (key, body, updated_at) VALUES (?1, ?2, datetime('now'))
                 ON CONFLICT(key) DO UPDATE
                 SET body = excluded.body, updated_at = excluded.updated_at",
                params![key, serde_json::to_string(&updated)?],
            )?;
            tx.commit()?;
            updated
        };
        debug!(key, "sqlite upsert");
        self.feed
            .publish(ChangeNotification::updated(key, updated.clone()));
        Ok(updated)
    }

    async fn put_new(&self, key: &str, doc: Document) -> Result<()> {
        let inserted = {
            let conn = self.lock()?;
            conn.execute(
                "INSERT OR IGNORE INTO documents (key, body) VALUES (?1, ?2)",
                params![key, serde_json::to_string(&doc)?],
            )?
        };
        if inserted == 0 {
            return Err(Error::Conflict(key.to_string()));
        }
        self.feed.publish(ChangeNotification::updated(key, doc));
        Ok(())
    }

    async fn range(&self, start: &str, end: &str) -> Result<Vec<(String, Document)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key, body FROM documents WHERE key >= ?1 AND key < ?2 ORDER BY key",
        )?;
        let rows = stmt
            .query_map(params![start, end], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(key, body)| -> Result<(String, Document)> {
                Ok((key, serde_json::from_str(&body)?))
            })
            .collect()
    }

    async fn delete(&self, key: &str) -> Result<()> {
        {
            let conn = self.lock()?;
            conn.execute("DELETE FROM documents WHERE key = ?1", params![key])?;
        }
        debug!(key, "sqlite delete");
        self.feed.publish(ChangeNotification::deleted(key));
        Ok(())
    }

    fn subscribe_changes(&self, keys: Option<Vec<String>>) -> ChangeSubscription {
        self.feed.subscribe(keys)
    }
}
