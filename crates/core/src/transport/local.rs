//! Spool directory transport.
//!
//! Payloads are read from an inbox directory and media is delivered by
//! copying it into per-destination folders of an outbox directory. Notices
//! are kept in memory and written to the log.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::TransportError;
use super::traits::{ProgressObserver, Transport};
use super::types::{Destination, MediaHandle, NoticeId, OutgoingMedia};
use crate::queue::PayloadRef;

const FORWARD_LOG: &str = "forwarded.log";

fn default_chunk_size() -> usize {
    256 * 1024
}

/// Configuration for [`LocalTransport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalTransportConfig {
    /// Directory payload sources are resolved against.
    pub inbox_dir: PathBuf,
    /// Directory delivered media is copied into.
    pub outbox_dir: PathBuf,
    /// Copy buffer size, and progress granularity, in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl LocalTransportConfig {
    pub fn new(inbox_dir: impl Into<PathBuf>, outbox_dir: impl Into<PathBuf>) -> Self {
        Self {
            inbox_dir: inbox_dir.into(),
            outbox_dir: outbox_dir.into(),
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Debug, Clone)]
struct Notice {
    destination: Destination,
    text: String,
}

/// Transport backed by local directories.
pub struct LocalTransport {
    config: LocalTransportConfig,
    notices: RwLock<HashMap<NoticeId, Notice>>,
    next_notice: AtomicU64,
}

impl LocalTransport {
    pub fn new(config: LocalTransportConfig) -> Self {
        Self {
            config,
            notices: RwLock::new(HashMap::new()),
            next_notice: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &LocalTransportConfig {
        &self.config
    }

    /// Current text of a notice that has not been deleted.
    pub async fn notice_text(&self, notice: &NoticeId) -> Option<String> {
        self.notices
            .read()
            .await
            .get(notice)
            .map(|n| n.text.clone())
    }

    fn destination_dir(&self, destination: &Destination) -> Result<PathBuf, TransportError> {
        let relative = checked_relative(&destination.id)?;
        Ok(self.config.outbox_dir.join(relative))
    }

    async fn copy_with_progress(
        &self,
        source: &Path,
        target: &Path,
        progress: &dyn ProgressObserver,
    ) -> Result<u64, TransportError> {
        let mut reader = File::open(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TransportError::NotFound(source.display().to_string())
            } else {
                TransportError::Io(e)
            }
        })?;
        let total = reader.metadata().await?.len();
        let mut writer = File::create(target).await?;

        let mut buffer = vec![0u8; self.config.chunk_size.max(1)];
        let mut copied = 0u64;
        loop {
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            writer.write_all(&buffer[..read]).await?;
            copied += read as u64;
            progress.on_progress(copied, total).await?;
        }
        writer.flush().await?;

        if total == 0 {
            progress.on_progress(0, 0).await?;
        }
        Ok(copied)
    }
}

/// Turn an untrusted relative path into one that stays inside its root.
fn checked_relative(raw: &str) -> Result<PathBuf, TransportError> {
    let path = Path::new(raw);
    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => {
                return Err(TransportError::Rejected(format!(
                    "path escapes spool directory: {raw}"
                )))
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(TransportError::Rejected(format!("empty path: {raw:?}")));
    }
    Ok(relative)
}

#[async_trait]
impl Transport for LocalTransport {
    fn name(&self) -> &str {
        "local"
    }

    async fn send_notice(
        &self,
        destination: &Destination,
        text: &str,
    ) -> Result<NoticeId, TransportError> {
        let id = NoticeId(format!(
            "local-{}",
            self.next_notice.fetch_add(1, Ordering::SeqCst)
        ));
        info!(destination = %destination, notice = %id, text, "Notice sent");
        self.notices.write().await.insert(
            id.clone(),
            Notice {
                destination: destination.clone(),
                text: text.to_string(),
            },
        );
        Ok(id)
    }

    async fn edit_notice(
        &self,
        destination: &Destination,
        notice: &NoticeId,
        text: &str,
    ) -> Result<(), TransportError> {
        let mut notices = self.notices.write().await;
        let entry = notices
            .get_mut(notice)
            .filter(|n| n.destination == *destination)
            .ok_or_else(|| TransportError::NotFound(notice.to_string()))?;
        if entry.text == text {
            return Err(TransportError::NotModified);
        }
        entry.text = text.to_string();
        debug!(destination = %destination, notice = %notice, text, "Notice edited");
        Ok(())
    }

    async fn delete_notice(
        &self,
        destination: &Destination,
        notice: &NoticeId,
    ) -> Result<(), TransportError> {
        let mut notices = self.notices.write().await;
        match notices.get(notice) {
            Some(n) if n.destination == *destination => {
                notices.remove(notice);
                debug!(destination = %destination, notice = %notice, "Notice deleted");
                Ok(())
            }
            _ => Err(TransportError::NotFound(notice.to_string())),
        }
    }

    async fn fetch(
        &self,
        payload: &PayloadRef,
        target: &Path,
        progress: &dyn ProgressObserver,
    ) -> Result<u64, TransportError> {
        let source = self.config.inbox_dir.join(checked_relative(&payload.source)?);
        let bytes = self.copy_with_progress(&source, target, progress).await?;
        info!(source = %payload.source, bytes, "Fetched payload");
        Ok(bytes)
    }

    async fn deliver(
        &self,
        destination: &Destination,
        media: &OutgoingMedia,
        progress: &dyn ProgressObserver,
    ) -> Result<MediaHandle, TransportError> {
        let file_name = media
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TransportError::Rejected(format!("no file name: {:?}", media.path)))?;
        let dir = self.destination_dir(destination)?;
        fs::create_dir_all(&dir).await?;

        let stored_name = format!("{}-{}", Uuid::new_v4().simple(), file_name);
        let target = dir.join(&stored_name);
        let bytes = self.copy_with_progress(&media.path, &target, progress).await?;

        if let Some(thumbnail) = &media.thumbnail {
            fs::copy(thumbnail, dir.join(format!("{stored_name}.jpg"))).await?;
        }
        fs::write(dir.join(format!("{stored_name}.txt")), &media.caption).await?;

        let handle = MediaHandle::new(format!("{}/{}", destination.id, stored_name));
        info!(
            destination = %destination,
            handle = %handle,
            bytes,
            duration_secs = media.duration_secs,
            "Delivered media"
        );
        Ok(handle)
    }

    async fn deliver_cached(
        &self,
        destination: &Destination,
        handle: &MediaHandle,
        caption: &str,
    ) -> Result<(), TransportError> {
        let stored = self.config.outbox_dir.join(checked_relative(handle.as_str())?);
        if !fs::try_exists(&stored).await? {
            return Err(TransportError::NotFound(handle.to_string()));
        }

        let dir = self.destination_dir(destination)?;
        fs::create_dir_all(&dir).await?;
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(FORWARD_LOG))
            .await?;
        let title = caption.lines().next().unwrap_or_default();
        log.write_all(format!("{handle}\t{title}\n").as_bytes())
            .await?;

        info!(destination = %destination, handle = %handle, "Forwarded cached media");
        Ok(())
    }
}
