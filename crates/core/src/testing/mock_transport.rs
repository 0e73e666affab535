//! Mock transport for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::queue::PayloadRef;
use crate::transport::{
    Destination, MediaHandle, NoticeId, OutgoingMedia, ProgressObserver, Transport,
    TransportError,
};

/// A call made against the mock, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    SendNotice {
        destination: Destination,
        notice: NoticeId,
        text: String,
    },
    EditNotice {
        destination: Destination,
        notice: NoticeId,
        text: String,
    },
    DeleteNotice {
        destination: Destination,
        notice: NoticeId,
    },
    Fetch {
        source: String,
        target: PathBuf,
    },
    Deliver {
        destination: Destination,
        path: PathBuf,
        caption: String,
        handle: MediaHandle,
    },
    DeliverCached {
        destination: Destination,
        handle: MediaHandle,
        caption: String,
    },
}

/// Mock implementation of the Transport trait.
///
/// - Records every call for assertions
/// - Writes configurable bytes on fetch, reporting progress in steps
/// - Simulates failures for the next fetch, delivery or edit
/// - Keeps notice texts so identical edits return `NotModified`
#[derive(Debug)]
pub struct MockTransport {
    calls: Arc<RwLock<Vec<TransportCall>>>,
    notices: Arc<RwLock<HashMap<NoticeId, String>>>,
    payloads: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    fetch_steps: Arc<RwLock<u64>>,
    step_delay: Arc<RwLock<Duration>>,
    next_fetch_error: Arc<RwLock<Option<TransportError>>>,
    next_deliver_error: Arc<RwLock<Option<TransportError>>>,
    next_edit_error: Arc<RwLock<Option<TransportError>>>,
    counter: AtomicU64,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            notices: Arc::new(RwLock::new(HashMap::new())),
            payloads: Arc::new(RwLock::new(HashMap::new())),
            fetch_steps: Arc::new(RwLock::new(4)),
            step_delay: Arc::new(RwLock::new(Duration::ZERO)),
            next_fetch_error: Arc::new(RwLock::new(None)),
            next_deliver_error: Arc::new(RwLock::new(None)),
            next_edit_error: Arc::new(RwLock::new(None)),
            counter: AtomicU64::new(0),
        }
    }

    /// Set the bytes a fetch of `source` writes. Unknown sources get 1 KiB of zeros.
    pub async fn set_payload(&self, source: &str, bytes: Vec<u8>) {
        self.payloads.write().await.insert(source.to_string(), bytes);
    }

    /// Number of progress callbacks per fetch.
    pub async fn set_fetch_steps(&self, steps: u64) {
        *self.fetch_steps.write().await = steps.max(1);
    }

    /// Delay between fetch progress callbacks.
    pub async fn set_step_delay(&self, delay: Duration) {
        *self.step_delay.write().await = delay;
    }

    pub async fn fail_next_fetch(&self, error: TransportError) {
        *self.next_fetch_error.write().await = Some(error);
    }

    pub async fn fail_next_deliver(&self, error: TransportError) {
        *self.next_deliver_error.write().await = Some(error);
    }

    pub async fn fail_next_edit(&self, error: TransportError) {
        *self.next_edit_error.write().await = Some(error);
    }

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<TransportCall> {
        self.calls.read().await.clone()
    }

    /// Texts of notices sent to a destination, in order.
    pub async fn sent_notices(&self, destination: &Destination) -> Vec<String> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                TransportCall::SendNotice {
                    destination: d,
                    text,
                    ..
                } if d == destination => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// All notice edits, in order.
    pub async fn recorded_edits(&self) -> Vec<(NoticeId, String)> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                TransportCall::EditNotice { notice, text, .. } => {
                    Some((notice.clone(), text.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Ids of all deleted notices.
    pub async fn deleted_notices(&self) -> Vec<NoticeId> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                TransportCall::DeleteNotice { notice, .. } => Some(notice.clone()),
                _ => None,
            })
            .collect()
    }

    /// Sources fetched, in order.
    pub async fn fetched_sources(&self) -> Vec<String> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                TransportCall::Fetch { source, .. } => Some(source.clone()),
                _ => None,
            })
            .collect()
    }

    /// Destinations media was uploaded to, with the returned handle.
    pub async fn deliveries(&self) -> Vec<(Destination, MediaHandle)> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                TransportCall::Deliver {
                    destination,
                    handle,
                    ..
                } => Some((destination.clone(), handle.clone())),
                _ => None,
            })
            .collect()
    }

    /// Handles re-sent by reference.
    pub async fn cached_deliveries(&self) -> Vec<(Destination, MediaHandle)> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                TransportCall::DeliverCached {
                    destination,
                    handle,
                    ..
                } => Some((destination.clone(), handle.clone())),
                _ => None,
            })
            .collect()
    }

    /// Notices sent and not yet deleted.
    pub async fn live_notices(&self) -> HashMap<NoticeId, String> {
        self.notices.read().await.clone()
    }

    fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn record(&self, call: TransportCall) {
        self.calls.write().await.push(call);
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_notice(
        &self,
        destination: &Destination,
        text: &str,
    ) -> Result<NoticeId, TransportError> {
        let notice = NoticeId(format!("notice-{}", self.next_id()));
        self.notices
            .write()
            .await
            .insert(notice.clone(), text.to_string());
        self.record(TransportCall::SendNotice {
            destination: destination.clone(),
            notice: notice.clone(),
            text: text.to_string(),
        })
        .await;
        Ok(notice)
    }

    async fn edit_notice(
        &self,
        destination: &Destination,
        notice: &NoticeId,
        text: &str,
    ) -> Result<(), TransportError> {
        if let Some(error) = self.next_edit_error.write().await.take() {
            return Err(error);
        }
        {
            let mut notices = self.notices.write().await;
            match notices.get_mut(notice) {
                Some(current) if current == text => return Err(TransportError::NotModified),
                Some(current) => *current = text.to_string(),
                None => return Err(TransportError::NotFound(notice.to_string())),
            }
        }
        self.record(TransportCall::EditNotice {
            destination: destination.clone(),
            notice: notice.clone(),
            text: text.to_string(),
        })
        .await;
        Ok(())
    }

    async fn delete_notice(
        &self,
        destination: &Destination,
        notice: &NoticeId,
    ) -> Result<(), TransportError> {
        self.notices.write().await.remove(notice);
        self.record(TransportCall::DeleteNotice {
            destination: destination.clone(),
            notice: notice.clone(),
        })
        .await;
        Ok(())
    }

    async fn fetch(
        &self,
        payload: &PayloadRef,
        target: &Path,
        progress: &dyn ProgressObserver,
    ) -> Result<u64, TransportError> {
        self.record(TransportCall::Fetch {
            source: payload.source.clone(),
            target: target.to_path_buf(),
        })
        .await;
        if let Some(error) = self.next_fetch_error.write().await.take() {
            return Err(error);
        }

        let bytes = self
            .payloads
            .read()
            .await
            .get(&payload.source)
            .cloned()
            .unwrap_or_else(|| vec![0u8; 1024]);
        let total = bytes.len() as u64;
        let steps = *self.fetch_steps.read().await;
        let delay = *self.step_delay.read().await;

        progress.on_progress(0, total).await?;
        for step in 1..=steps {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            progress.on_progress(total * step / steps, total).await?;
        }

        tokio::fs::write(target, &bytes).await?;
        Ok(total)
    }

    async fn deliver(
        &self,
        destination: &Destination,
        media: &OutgoingMedia,
        progress: &dyn ProgressObserver,
    ) -> Result<MediaHandle, TransportError> {
        if let Some(error) = self.next_deliver_error.write().await.take() {
            return Err(error);
        }
        let total = tokio::fs::metadata(&media.path).await?.len();
        progress.on_progress(total, total).await?;

        let handle = MediaHandle(format!("media-{}", self.next_id()));
        self.record(TransportCall::Deliver {
            destination: destination.clone(),
            path: media.path.clone(),
            caption: media.caption.clone(),
            handle: handle.clone(),
        })
        .await;
        Ok(handle)
    }

    async fn deliver_cached(
        &self,
        destination: &Destination,
        handle: &MediaHandle,
        caption: &str,
    ) -> Result<(), TransportError> {
        if let Some(error) = self.next_deliver_error.write().await.take() {
            return Err(error);
        }
        self.record(TransportCall::DeliverCached {
            destination: destination.clone(),
            handle: handle.clone(),
            caption: caption.to_string(),
        })
        .await;
        Ok(())
    }
}
