//! Configuration for the coordinator module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::transport::Destination;

/// Queue and stage behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Upper bound between head checks of a waiting job in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// How long transient notices stay visible in milliseconds.
    #[serde(default = "default_notice_retract_delay")]
    pub notice_retract_delay_ms: u64,

    /// Container every delivered video ends up in.
    #[serde(default = "default_target_container")]
    pub target_container: String,

    /// Thumbnail frame offset into the video in seconds.
    #[serde(default = "default_thumbnail_offset")]
    pub thumbnail_offset_secs: f64,
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_notice_retract_delay() -> u64 {
    3000
}

fn default_target_container() -> String {
    "mp4".to_string()
}

fn default_thumbnail_offset() -> f64 {
    1.0
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            notice_retract_delay_ms: default_notice_retract_delay(),
            target_container: default_target_container(),
            thumbnail_offset_secs: default_thumbnail_offset(),
        }
    }
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn notice_retract_delay(&self) -> Duration {
        Duration::from_millis(self.notice_retract_delay_ms)
    }
}

/// Removal of intermediate files after a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Base delay between retries in milliseconds; release checks back off linearly.
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,

    /// How many times to check that a file is no longer held open.
    /// Unset keeps checking until the file is released.
    #[serde(default)]
    pub max_release_checks: Option<u32>,

    /// How many times to try deleting a file.
    #[serde(default = "default_max_delete_attempts")]
    pub max_delete_attempts: u32,
}

fn default_retry_interval() -> u64 {
    2000
}

fn default_max_delete_attempts() -> u32 {
    10
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: default_retry_interval(),
            max_release_checks: None,
            max_delete_attempts: default_max_delete_attempts(),
        }
    }
}

/// Release check backoff stops growing after this many steps.
const MAX_BACKOFF_STEPS: u32 = 15;

impl CleanupConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Delay after the `attempt`-th failed release check.
    pub fn release_backoff(&self, attempt: u32) -> Duration {
        self.retry_interval() * attempt.clamp(1, MAX_BACKOFF_STEPS)
    }
}

/// Everything the coordinator needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Parent of the per-job work directories.
    pub work_dir: PathBuf,
    /// Every processed video is also delivered here; its handle is cached.
    pub broadcast: Destination,
    pub queue: QueueConfig,
    pub cleanup: CleanupConfig,
}

impl CoordinatorConfig {
    pub fn new(work_dir: impl Into<PathBuf>, broadcast: Destination) -> Self {
        Self {
            work_dir: work_dir.into(),
            broadcast,
            queue: QueueConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }

    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_cleanup(mut self, cleanup: CleanupConfig) -> Self {
        self.cleanup = cleanup;
        self
    }
}
