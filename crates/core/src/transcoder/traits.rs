//! Trait definitions for the transcoder module.

use async_trait::async_trait;
use std::path::Path;

use super::error::TranscoderError;
use super::types::MediaInfo;

/// Re-encodes videos and extracts stills.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Re-encode `input` into the streaming-friendly target format at `output`.
    async fn normalize(&self, input: &Path, output: &Path) -> Result<(), TranscoderError>;

    /// Write a single frame taken `offset_secs` into `input` as an image at `output`.
    async fn extract_thumbnail(
        &self,
        input: &Path,
        output: &Path,
        offset_secs: f64,
    ) -> Result<(), TranscoderError>;

    /// Read duration, size, container and dimensions of a file.
    async fn probe(&self, path: &Path) -> Result<MediaInfo, TranscoderError>;
}
