//! Types for the transcoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Information about a media file, as reported by the probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub duration_secs: f64,
    /// Container format name (first entry of ffprobe's `format_name`).
    pub container: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl MediaInfo {
    /// Duration rounded down to whole seconds.
    pub fn whole_seconds(&self) -> u64 {
        if self.duration_secs.is_finite() && self.duration_secs > 0.0 {
            self.duration_secs as u64
        } else {
            0
        }
    }
}
