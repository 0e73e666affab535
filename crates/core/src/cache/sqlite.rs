//! SQLite-backed artifact cache implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{ArtifactCache, CacheEntry, CacheError};
use crate::transport::MediaHandle;

/// SQLite-backed artifact cache.
pub struct SqliteArtifactCache {
    conn: Mutex<Connection>,
}

impl SqliteArtifactCache {
    /// Open (or create) the cache database at `path`.
    pub fn new(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Database(e.to_string()))?;
        }
        let conn = Connection::open(path).map_err(|e| CacheError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory().map_err(|e| CacheError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CacheError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS artifact_cache (
                name TEXT PRIMARY KEY,
                handle TEXT NOT NULL,
                stored_at TEXT NOT NULL,
                store_count INTEGER NOT NULL DEFAULT 1
            );
            "#,
        )
        .map_err(|e| CacheError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Database("connection lock poisoned".to_string()))
    }
}

impl ArtifactCache for SqliteArtifactCache {
    fn get(&self, name: &str) -> Result<Option<MediaHandle>, CacheError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT handle FROM artifact_cache WHERE name = ?",
            params![name],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map(|handle| handle.map(MediaHandle))
        .map_err(|e| CacheError::Database(e.to_string()))
    }

    fn put(&self, name: &str, handle: &MediaHandle) -> Result<(), CacheError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO artifact_cache (name, handle, stored_at, store_count)
             VALUES (?1, ?2, ?3, 1)
             ON CONFLICT(name) DO UPDATE SET
                handle = excluded.handle,
                stored_at = excluded.stored_at,
                store_count = store_count + 1",
            params![name, handle.as_str(), Utc::now().to_rfc3339()],
        )
        .map_err(|e| CacheError::Database(e.to_string()))?;
        Ok(())
    }

    fn entry(&self, name: &str) -> Result<Option<CacheEntry>, CacheError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT name, handle, stored_at, store_count FROM artifact_cache WHERE name = ?",
            params![name],
            |row| {
                let stored_at_str: String = row.get(2)?;
                let stored_at = DateTime::parse_from_rfc3339(&stored_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());
                Ok(CacheEntry {
                    name: row.get(0)?,
                    handle: MediaHandle(row.get(1)?),
                    stored_at,
                    store_count: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(|e| CacheError::Database(e.to_string()))
    }

    fn remove(&self, name: &str) -> Result<bool, CacheError> {
        let conn = self.conn()?;
        let removed = conn
            .execute("DELETE FROM artifact_cache WHERE name = ?", params![name])
            .map_err(|e| CacheError::Database(e.to_string()))?;
        Ok(removed > 0)
    }

    fn len(&self) -> Result<usize, CacheError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM artifact_cache", [], |row| row.get(0))
            .map_err(|e| CacheError::Database(e.to_string()))?;
        Ok(count as usize)
    }
}
