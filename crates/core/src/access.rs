//! Runtime list of submitters allowed to submit.
//!
//! Seeded from `access.allowed_submitters` and, when `access.users_file` is
//! set, from that file. Changes made at runtime are written back to the
//! file. An empty list admits everyone.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::AccessConfig;
use crate::queue::SubmitterId;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Failed to read allow list {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid allow list {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Failed to write allow list {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid submitter id: {0:?}")]
    InvalidSubmitter(String),
}

/// On-disk shape of the users file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct AllowListFile {
    #[serde(default)]
    allowed_submitters: Vec<String>,
}

pub struct AllowList {
    entries: RwLock<BTreeSet<String>>,
    file: Option<PathBuf>,
}

impl AllowList {
    /// In-memory list that is never persisted.
    pub fn new(initial: impl IntoIterator<Item = String>) -> Self {
        Self {
            entries: RwLock::new(initial.into_iter().collect()),
            file: None,
        }
    }

    /// Build the list from config, merging the users file if it exists.
    pub async fn load(config: &AccessConfig) -> Result<Self, AccessError> {
        let mut entries: BTreeSet<String> = config.allowed_submitters.iter().cloned().collect();
        if let Some(path) = &config.users_file {
            let stored = read_file(path).await?;
            info!(path = %path.display(), entries = stored.len(), "Loaded allow list");
            entries.extend(stored);
        }
        Ok(Self {
            entries: RwLock::new(entries),
            file: config.users_file.clone(),
        })
    }

    pub async fn is_allowed(&self, submitter: &SubmitterId) -> bool {
        let entries = self.entries.read().await;
        entries.is_empty() || entries.contains(submitter.as_str())
    }

    /// Add a submitter. Returns `false` when already present.
    pub async fn add(&self, submitter: &SubmitterId) -> Result<bool, AccessError> {
        let id = submitter.as_str().trim();
        if id.is_empty() {
            return Err(AccessError::InvalidSubmitter(submitter.to_string()));
        }
        let mut entries = self.entries.write().await;
        if !entries.insert(id.to_string()) {
            return Ok(false);
        }
        if let Err(e) = self.persist(&entries).await {
            entries.remove(id);
            return Err(e);
        }
        info!(submitter = id, "Submitter allowed");
        Ok(true)
    }

    /// Remove a submitter. Returns `false` when not present.
    pub async fn remove(&self, submitter: &SubmitterId) -> Result<bool, AccessError> {
        let mut entries = self.entries.write().await;
        if !entries.remove(submitter.as_str()) {
            return Ok(false);
        }
        if let Err(e) = self.persist(&entries).await {
            entries.insert(submitter.as_str().to_string());
            return Err(e);
        }
        if entries.is_empty() {
            warn!("Allow list is now empty, every submitter is admitted");
        }
        info!(submitter = %submitter, "Submitter removed");
        Ok(true)
    }

    /// Every allowed submitter, sorted.
    pub async fn list(&self) -> Vec<String> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn persist(&self, entries: &BTreeSet<String>) -> Result<(), AccessError> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        let body = AllowListFile {
            allowed_submitters: entries.iter().cloned().collect(),
        };
        let text = toml::to_string(&body).map_err(|e| AccessError::Parse {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let write_err = |source| AccessError::Write {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, text).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(write_err)
    }
}

async fn read_file(path: &Path) -> Result<Vec<String>, AccessError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(AccessError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let file: AllowListFile = toml::from_str(&text).map_err(|e| AccessError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(file.allowed_submitters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(s: &str) -> SubmitterId {
        SubmitterId::new(s)
    }

    #[tokio::test]
    async fn test_empty_list_admits_everyone() {
        let list = AllowList::new(Vec::new());
        assert!(list.is_allowed(&id("anyone")).await);
    }

    #[tokio::test]
    async fn test_add_and_remove() {
        let list = AllowList::new(vec!["alice".to_string()]);
        assert!(!list.is_allowed(&id("bob")).await);

        assert!(list.add(&id("bob")).await.unwrap());
        assert!(!list.add(&id("bob")).await.unwrap());
        assert!(list.is_allowed(&id("bob")).await);

        assert!(list.remove(&id("alice")).await.unwrap());
        assert!(!list.remove(&id("alice")).await.unwrap());
        assert_eq!(list.list().await, vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn test_blank_submitter_rejected() {
        let list = AllowList::new(Vec::new());
        assert!(matches!(
            list.add(&id("  ")).await,
            Err(AccessError::InvalidSubmitter(_))
        ));
        assert!(list.is_empty().await);
    }

    #[tokio::test]
    async fn test_changes_survive_reload() {
        let dir = TempDir::new().unwrap();
        let config = AccessConfig {
            allowed_submitters: vec!["alice".to_string()],
            users_file: Some(dir.path().join("access/users.toml")),
            ..Default::default()
        };

        let list = AllowList::load(&config).await.unwrap();
        list.add(&id("bob")).await.unwrap();
        list.add(&id("carol")).await.unwrap();
        list.remove(&id("carol")).await.unwrap();

        let reloaded = AllowList::load(&config).await.unwrap();
        assert_eq!(
            reloaded.list().await,
            vec!["alice".to_string(), "bob".to_string()]
        );
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.toml");
        std::fs::write(&path, "allowed_submitters = 42").unwrap();
        let config = AccessConfig {
            users_file: Some(path),
            ..Default::default()
        };

        assert!(matches!(
            AllowList::load(&config).await,
            Err(AccessError::Parse { .. })
        ));
    }
}
