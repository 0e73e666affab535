//! Removal of a job's work directory.
//!
//! A file still held open by a lingering process can not always be removed
//! right away, so each file is first checked for release with linear
//! backoff (until released, unless a limit is configured) and then deleted
//! with a bounded number of attempts.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::CleanupConfig;
use crate::clock::Clock;

/// Delete every file in `dir` and then the directory itself.
///
/// Returns `true` when the directory is gone afterwards.
pub async fn cleanup_workspace(dir: &Path, config: &CleanupConfig, clock: Arc<dyn Clock>) -> bool {
    let files = match list_files(dir).await {
        Ok(files) => files,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to list work directory");
            Vec::new()
        }
    };

    for file in &files {
        if !wait_for_release(file, config, clock.as_ref()).await {
            warn!(path = %file.display(), "File still in use, deleting anyway");
        }
        delete_with_retry(file, config, clock.as_ref()).await;
    }

    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {
            info!(dir = %dir.display(), files = files.len(), "Cleaned up work directory");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to remove work directory");
            false
        }
    }
}

async fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Wait until `path` can be opened for appending, or no longer exists.
///
/// Returns `false` only when `max_release_checks` is set and exhausted.
pub async fn wait_for_release(path: &Path, config: &CleanupConfig, clock: &dyn Clock) -> bool {
    wait_until_released(path, config, clock, |path| async move {
        tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .map(drop)
    })
    .await
}

async fn wait_until_released<F, Fut>(
    path: &Path,
    config: &CleanupConfig,
    clock: &dyn Clock,
    mut check: F,
) -> bool
where
    F: FnMut(PathBuf) -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        match check(path.to_path_buf()).await {
            Ok(()) => return true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
            Err(e) => {
                debug!(path = %path.display(), attempt, error = %e, "File not released yet");
                if config.max_release_checks.is_some_and(|max| attempt >= max) {
                    return false;
                }
                clock.sleep(config.release_backoff(attempt)).await;
            }
        }
    }
}

/// Delete `path`, retrying up to `max_delete_attempts` times.
pub async fn delete_with_retry(path: &Path, config: &CleanupConfig, clock: &dyn Clock) -> bool {
    let attempts = config.max_delete_attempts.max(1);
    for attempt in 1..=attempts {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted file");
                return true;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
            Err(e) => {
                if attempt == attempts {
                    warn!(path = %path.display(), attempts, error = %e, "Giving up deleting file");
                } else {
                    debug!(path = %path.display(), attempt, error = %e, "Delete failed, retrying");
                    clock.sleep(config.retry_interval()).await;
                }
            }
        }
    }
    false
}
