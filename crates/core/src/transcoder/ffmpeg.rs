//! FFmpeg-based transcoder implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::config::TranscoderConfig;
use super::error::TranscoderError;
use super::traits::Transcoder;
use super::types::MediaInfo;

/// Keep at most this many bytes of stderr on failure.
const STDERR_TAIL: usize = 2000;

/// FFmpeg-based transcoder implementation.
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
}

impl FfmpegTranscoder {
    /// Creates a new FFmpeg transcoder with the given configuration.
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    /// Creates a transcoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TranscoderConfig::default())
    }

    /// Builds ffmpeg arguments for re-encoding into a streamable mp4.
    fn build_normalize_args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-c:v".to_string(),
            self.config.video_codec.clone(),
            "-c:a".to_string(),
            self.config.audio_codec.clone(),
            // Index up front for progressive playback
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-y".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    /// Builds ffmpeg arguments for grabbing one scaled frame.
    fn build_thumbnail_args(&self, input: &Path, output: &Path, offset_secs: f64) -> Vec<String> {
        vec![
            "-ss".to_string(),
            format!("{:.1}", offset_secs.max(0.0)),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-vframes".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            format!("scale={}:-1", self.config.thumbnail_width),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-y".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    /// Parses ffprobe JSON output into MediaInfo.
    fn parse_probe_output(path: &Path, output: &str) -> Result<MediaInfo, TranscoderError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
            size: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            codec_name: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| TranscoderError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        let duration_secs = probe
            .format
            .duration
            .as_ref()
            .and_then(|d| d.parse::<f64>().ok())
            .ok_or_else(|| TranscoderError::ParseError {
                reason: "ffprobe reported no duration".to_string(),
            })?;

        let size_bytes = probe
            .format
            .size
            .as_ref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");

        let container = probe
            .format
            .format_name
            .split(',')
            .next()
            .unwrap_or("unknown");

        Ok(MediaInfo {
            path: path.to_path_buf(),
            size_bytes,
            duration_secs,
            container: container.to_string(),
            video_codec: video_stream.and_then(|s| s.codec_name.clone()),
            width: video_stream.and_then(|s| s.width),
            height: video_stream.and_then(|s| s.height),
        })
    }

    /// Runs a binary to completion, killing it if the timeout elapses.
    async fn run(&self, binary: &Path, args: &[String]) -> Result<Output, TranscoderError> {
        debug!(binary = %binary.display(), ?args, "Running external tool");

        let mut command = Command::new(binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                self.not_found(binary)
            } else {
                TranscoderError::Io(e)
            }
        })?;

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        match timeout(timeout_duration, child.wait_with_output()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(TranscoderError::Timeout {
                timeout_secs: self.config.timeout_secs,
            }),
        }
    }

    fn not_found(&self, binary: &Path) -> TranscoderError {
        if binary == self.config.ffprobe_path {
            TranscoderError::FfprobeNotFound {
                path: binary.to_path_buf(),
            }
        } else {
            TranscoderError::FfmpegNotFound {
                path: binary.to_path_buf(),
            }
        }
    }

    async fn run_ffmpeg(&self, args: &[String], output: &Path) -> Result<(), TranscoderError> {
        let result = self.run(&self.config.ffmpeg_path, args).await?;
        if !result.status.success() {
            return Err(TranscoderError::process_failed(
                format!("FFmpeg exited with code: {:?}", result.status.code()),
                stderr_tail(&result.stderr),
            ));
        }
        if tokio::fs::metadata(output).await.is_err() {
            return Err(TranscoderError::process_failed(
                "Output file not created",
                None,
            ));
        }
        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let start = text
        .char_indices()
        .map(|(i, _)| i)
        .find(|i| text.len() - i <= STDERR_TAIL)
        .unwrap_or(0);
    Some(text[start..].to_string())
}

fn ensure_input(path: &Path) -> Result<(), TranscoderError> {
    if path.exists() {
        Ok(())
    } else {
        Err(TranscoderError::InputNotFound {
            path: PathBuf::from(path),
        })
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn normalize(&self, input: &Path, output: &Path) -> Result<(), TranscoderError> {
        ensure_input(input)?;
        let args = self.build_normalize_args(input, output);
        self.run_ffmpeg(&args, output).await
    }

    async fn extract_thumbnail(
        &self,
        input: &Path,
        output: &Path,
        offset_secs: f64,
    ) -> Result<(), TranscoderError> {
        ensure_input(input)?;
        let args = self.build_thumbnail_args(input, output, offset_secs);
        self.run_ffmpeg(&args, output).await
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, TranscoderError> {
        ensure_input(path)?;

        let args: Vec<String> = [
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(path.to_string_lossy().to_string()))
        .collect();

        let output = self.run(&self.config.ffprobe_path, &args).await?;
        if !output.status.success() {
            return Err(TranscoderError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(path, &stdout)
    }
}
