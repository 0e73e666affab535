//! Transcoder module for normalizing videos and extracting thumbnails.
//!
//! [`FfmpegTranscoder`] shells out to ffmpeg and ffprobe with a per-run
//! timeout. The coordinator only depends on the [`Transcoder`] trait.

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::TranscoderConfig;
pub use error::TranscoderError;
pub use ffmpeg::FfmpegTranscoder;
pub use traits::Transcoder;
pub use types::MediaInfo;
