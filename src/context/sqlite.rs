//! SQLite-backed keyed store.

use super::KeyedStore;
use crate::error::{DugoutError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS context (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
"#;

/// Keyed store in a single SQLite table; every put replaces one row.
pub struct SqliteKeyedStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyedStore {
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized context store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DugoutError::Config(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl KeyedStore for SqliteKeyedStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM context WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO context (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = SqliteKeyedStore::in_memory().unwrap();
        assert_eq!(store.get("missing").await.unwrap(), None);

        store.put("summary:3", "Top of the 2nd").await.unwrap();
        store.put("summary:3", "Bottom of the 2nd").await.unwrap();
        assert_eq!(
            store.get("summary:3").await.unwrap().as_deref(),
            Some("Bottom of the 2nd")
        );
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.db");

        {
            let context = ContextStore::new(Arc::new(SqliteKeyedStore::new(&path).unwrap()));
            context.link_segment("segment_2.mp4", 5).await.unwrap();
        }

        let context = ContextStore::new(Arc::new(SqliteKeyedStore::new(&path).unwrap()));
        assert_eq!(context.index_for_segment("segment_2.mp4").await.unwrap(), Some(5));
    }
}
