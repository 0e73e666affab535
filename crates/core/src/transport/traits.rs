//! Trait definitions for the transport module.

use async_trait::async_trait;
use std::path::Path;

use super::error::TransportError;
use super::types::{Destination, MediaHandle, NoticeId, OutgoingMedia};
use crate::queue::PayloadRef;

/// Receives `(current, total)` byte progress during a transfer.
///
/// Returning an error aborts the transfer; the transport surfaces the error
/// to its caller unchanged.
#[async_trait]
pub trait ProgressObserver: Send + Sync {
    async fn on_progress(&self, current: u64, total: u64) -> Result<(), TransportError>;
}

/// Observer that ignores progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

#[async_trait]
impl ProgressObserver for NoProgress {
    async fn on_progress(&self, _current: u64, _total: u64) -> Result<(), TransportError> {
        Ok(())
    }
}

/// The channel media arrives on and is delivered through.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the name of this transport implementation.
    fn name(&self) -> &str;

    /// Sends a text notice and returns its id for later edits.
    async fn send_notice(
        &self,
        destination: &Destination,
        text: &str,
    ) -> Result<NoticeId, TransportError>;

    /// Replaces the text of a notice.
    ///
    /// Returns [`TransportError::NotModified`] when the text is unchanged.
    async fn edit_notice(
        &self,
        destination: &Destination,
        notice: &NoticeId,
        text: &str,
    ) -> Result<(), TransportError>;

    /// Deletes a notice.
    async fn delete_notice(
        &self,
        destination: &Destination,
        notice: &NoticeId,
    ) -> Result<(), TransportError>;

    /// Downloads a payload to `target`, returning the number of bytes written.
    async fn fetch(
        &self,
        payload: &PayloadRef,
        target: &Path,
        progress: &dyn ProgressObserver,
    ) -> Result<u64, TransportError>;

    /// Uploads media to a destination.
    async fn deliver(
        &self,
        destination: &Destination,
        media: &OutgoingMedia,
        progress: &dyn ProgressObserver,
    ) -> Result<MediaHandle, TransportError>;

    /// Re-sends previously delivered media by handle.
    async fn deliver_cached(
        &self,
        destination: &Destination,
        handle: &MediaHandle,
        caption: &str,
    ) -> Result<(), TransportError>;
}
