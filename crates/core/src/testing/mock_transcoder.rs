//! Mock transcoder for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::transcoder::{MediaInfo, Transcoder, TranscoderError};

/// Which transcoder operation a recorded call was.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscoderCall {
    Normalize { input: PathBuf, output: PathBuf },
    Thumbnail { input: PathBuf, output: PathBuf, offset_secs: f64 },
    Probe { path: PathBuf },
}

/// Mock implementation of the Transcoder trait.
///
/// Normalizing copies the input, thumbnails are small placeholder files,
/// and probing reports a configurable duration.
#[derive(Debug)]
pub struct MockTranscoder {
    calls: Arc<RwLock<Vec<TranscoderCall>>>,
    duration_secs: Arc<RwLock<f64>>,
    next_normalize_error: Arc<RwLock<Option<TranscoderError>>>,
    next_thumbnail_error: Arc<RwLock<Option<TranscoderError>>>,
    next_probe_error: Arc<RwLock<Option<TranscoderError>>>,
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscoder {
    /// Create a new mock transcoder.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            duration_secs: Arc::new(RwLock::new(60.0)),
            next_normalize_error: Arc::new(RwLock::new(None)),
            next_thumbnail_error: Arc::new(RwLock::new(None)),
            next_probe_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Duration reported by `probe`.
    pub async fn set_duration(&self, duration_secs: f64) {
        *self.duration_secs.write().await = duration_secs;
    }

    pub async fn fail_next_normalize(&self, error: TranscoderError) {
        *self.next_normalize_error.write().await = Some(error);
    }

    pub async fn fail_next_thumbnail(&self, error: TranscoderError) {
        *self.next_thumbnail_error.write().await = Some(error);
    }

    pub async fn fail_next_probe(&self, error: TranscoderError) {
        *self.next_probe_error.write().await = Some(error);
    }

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<TranscoderCall> {
        self.calls.read().await.clone()
    }

    /// Number of normalize calls.
    pub async fn normalize_count(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|call| matches!(call, TranscoderCall::Normalize { .. }))
            .count()
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn normalize(&self, input: &Path, output: &Path) -> Result<(), TranscoderError> {
        self.calls.write().await.push(TranscoderCall::Normalize {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        });
        if let Some(error) = self.next_normalize_error.write().await.take() {
            return Err(error);
        }
        tokio::fs::copy(input, output).await?;
        Ok(())
    }

    async fn extract_thumbnail(
        &self,
        input: &Path,
        output: &Path,
        offset_secs: f64,
    ) -> Result<(), TranscoderError> {
        self.calls.write().await.push(TranscoderCall::Thumbnail {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            offset_secs,
        });
        if let Some(error) = self.next_thumbnail_error.write().await.take() {
            return Err(error);
        }
        tokio::fs::write(output, b"thumbnail").await?;
        Ok(())
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, TranscoderError> {
        self.calls.write().await.push(TranscoderCall::Probe {
            path: path.to_path_buf(),
        });
        if let Some(error) = self.next_probe_error.write().await.take() {
            return Err(error);
        }
        let size_bytes = tokio::fs::metadata(path).await?.len();
        Ok(MediaInfo {
            path: path.to_path_buf(),
            size_bytes,
            duration_secs: *self.duration_secs.read().await,
            container: "mov".to_string(),
            video_codec: Some("h264".to_string()),
            width: Some(1280),
            height: Some(720),
        })
    }
}
