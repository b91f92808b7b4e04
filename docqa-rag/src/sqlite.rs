//! SQLite-backed document store.
//!
//! One database file holds the uploaded documents, the question history and
//! a few saved preferences.
//!
//! This module is only available when the `sqlite` feature is enabled.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, error};

use crate::document::{Document, DocumentId, DocumentKind};
use crate::error::{RagError, Result};
use crate::history::{Exchange, HistoryLog};
use crate::store::{DocumentStore, NewDocument};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT NOT NULL,
    title TEXT,
    file_type TEXT,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    question TEXT NOT NULL,
    answer TEXT NOT NULL,
    asked_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);";

fn store_error(message: impl Into<String>) -> RagError {
    RagError::StoreError { backend: "SQLite".into(), message: message.into() }
}

/// A [`DocumentStore`] persisted in a SQLite database file.
///
/// Queries run on the blocking thread pool; the connection is shared behind
/// a mutex.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::SqliteDocumentStore;
///
/// let store = SqliteDocumentStore::open("docqa.db")?;
/// let documents = store.list().await?;
/// ```
#[derive(Clone)]
pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDocumentStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to open database");
            store_error(format!("failed to open {}: {e}", path.display()))
        })?;
        Self::with_connection(conn)
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| store_error(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| store_error(format!("failed to create schema: {e}")))?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| store_error("connection mutex poisoned"))?;
            f(&guard).map_err(|e| {
                error!(error = %e, "query failed");
                store_error(e.to_string())
            })
        })
        .await
        .map_err(|e| store_error(format!("query task failed: {e}")))?
    }

    /// A saved preference.
    pub async fn setting(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.run(move |conn| {
            conn.query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
        })
        .await
    }

    /// Save a preference, replacing any earlier value.
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let (key, value) = (key.to_string(), value.to_string());
        debug!(key = %key, value = %value, "saving setting");
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map(|_| ())
        })
        .await
    }
}

/// Stored ids are integers; anything else cannot match a row.
fn numeric_id(id: &DocumentId) -> Option<i64> {
    id.as_str().parse().ok()
}

fn timestamp(row: &rusqlite::Row<'_>, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&text).map(|t| t.with_timezone(&Utc)).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let id: i64 = row.get(0)?;
    let created_at = timestamp(row, 4)?;
    Ok(Document {
        id: DocumentId::from(id),
        text: row.get(1)?,
        title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        kind: DocumentKind::parse(&row.get::<_, Option<String>>(3)?.unwrap_or_default()),
        created_at,
    })
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert(&self, document: NewDocument) -> Result<Document> {
        let created_at = Utc::now();
        let stamp = created_at.to_rfc3339();
        let text = document.text.clone();
        let title = document.title.clone();
        let kind = document.kind.to_string();

        let id = self
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO documents (text, title, file_type, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![text, title, kind, stamp],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        debug!(id, title = %document.title, "stored document");
        Ok(Document {
            id: DocumentId::from(id),
            title: document.title,
            text: document.text,
            kind: document.kind,
            created_at,
        })
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>> {
        let Some(id) = numeric_id(id) else {
            return Ok(None);
        };
        self.run(move |conn| {
            conn.query_row(
                "SELECT id, text, title, file_type, created_at FROM documents WHERE id = ?1",
                params![id],
                row_to_document,
            )
            .optional()
        })
        .await
    }

    async fn list(&self) -> Result<Vec<Document>> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, text, title, file_type, created_at FROM documents ORDER BY id",
            )?;
            let rows = stmt.query_map([], row_to_document)?;
            rows.collect()
        })
        .await
    }

    async fn delete(&self, id: &DocumentId) -> Result<bool> {
        let Some(id) = numeric_id(id) else {
            return Ok(false);
        };
        let deleted = self
            .run(move |conn| conn.execute("DELETE FROM documents WHERE id = ?1", params![id]))
            .await?;
        debug!(id, deleted, "deleted document");
        Ok(deleted > 0)
    }
}

#[async_trait]
impl HistoryLog for SqliteDocumentStore {
    async fn record(&self, exchange: Exchange) -> Result<()> {
        let stamp = exchange.asked_at.to_rfc3339();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO history (question, answer, asked_at) VALUES (?1, ?2, ?3)",
                params![exchange.question, exchange.answer, stamp],
            )
            .map(|_| ())
        })
        .await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Exchange>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut latest = self
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT question, answer, asked_at FROM history ORDER BY id DESC LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit], |row| {
                    Ok(Exchange {
                        question: row.get(0)?,
                        answer: row.get(1)?,
                        asked_at: timestamp(row, 2)?,
                    })
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;
        latest.reverse();
        Ok(latest)
    }
}
