//! Artifact cache - delivered media by normalized name.
//!
//! When a title has already been processed and delivered, its handle lets
//! the coordinator re-send the media without transferring or transcoding
//! it again.

mod sqlite;

pub use sqlite::SqliteArtifactCache;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::MediaHandle;

/// Errors from artifact cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(String),
}

/// A stored cache row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub name: String,
    pub handle: MediaHandle,
    pub stored_at: DateTime<Utc>,
    /// How many times this name has been written.
    pub store_count: u32,
}

/// Durable map from normalized name to delivered media handle.
///
/// Keys are unique; a later `put` replaces the earlier handle.
pub trait ArtifactCache: Send + Sync {
    /// Look up the handle stored for `name`.
    fn get(&self, name: &str) -> Result<Option<MediaHandle>, CacheError>;

    /// Store or replace the handle for `name`.
    fn put(&self, name: &str, handle: &MediaHandle) -> Result<(), CacheError>;

    /// Full entry for `name`, including bookkeeping columns.
    fn entry(&self, name: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Remove an entry. Returns whether it existed.
    fn remove(&self, name: &str) -> Result<bool, CacheError>;

    /// Number of stored entries.
    fn len(&self) -> Result<usize, CacheError>;

    fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}
