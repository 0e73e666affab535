use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::coordinator::{CleanupConfig, CoordinatorConfig, QueueConfig};
use crate::progress::ProgressConfig;
use crate::queue::SubmitterId;
use crate::rate_limiter::RateLimitConfig;
use crate::transcoder::TranscoderConfig;
use crate::transport::{Destination, LocalTransportConfig};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    /// Coordinator settings derived from this configuration.
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig::new(self.paths.work_dir.clone(), self.broadcast.destination())
            .with_queue(self.queue.clone())
            .with_cleanup(self.cleanup.clone())
    }

    /// Spool transport settings derived from this configuration.
    pub fn transport_config(&self) -> LocalTransportConfig {
        let mut config =
            LocalTransportConfig::new(self.paths.inbox_dir.clone(), self.paths.outbox_dir.clone());
        if let Some(chunk_size) = self.paths.chunk_size {
            config.chunk_size = chunk_size;
        }
        config
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Directories used by the spool transport and the pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Root for per-job work directories.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_inbox_dir")]
    pub inbox_dir: PathBuf,
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: PathBuf,
    /// Transfer chunk size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            inbox_dir: default_inbox_dir(),
            outbox_dir: default_outbox_dir(),
            chunk_size: None,
        }
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("work")
}

fn default_inbox_dir() -> PathBuf {
    PathBuf::from("inbox")
}

fn default_outbox_dir() -> PathBuf {
    PathBuf::from("outbox")
}

/// Destination that receives a copy of every processed video.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BroadcastConfig {
    pub destination: String,
    /// Whether the destination is a group or channel.
    #[serde(default = "default_shared")]
    pub shared: bool,
}

impl BroadcastConfig {
    pub fn destination(&self) -> Destination {
        if self.shared {
            Destination::shared(self.destination.clone())
        } else {
            Destination::direct(self.destination.clone())
        }
    }
}

fn default_shared() -> bool {
    true
}

/// Who may submit. An empty list admits everyone.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub allowed_submitters: Vec<String>,

    /// File holding submitters added at runtime (TOML, merged at startup)
    #[serde(default)]
    pub users_file: Option<PathBuf>,

    /// Key required by the allow list management endpoints; unset disables them
    #[serde(default)]
    pub admin_api_key: Option<String>,
}

impl AccessConfig {
    pub fn is_allowed(&self, submitter: &SubmitterId) -> bool {
        self.allowed_submitters.is_empty()
            || self
                .allowed_submitters
                .iter()
                .any(|allowed| allowed == submitter.as_str())
    }
}

/// Artifact cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
        }
    }
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("vidrelay.db")
}

/// Sanitized config for API responses (submitter names reduced to a count)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub broadcast: BroadcastConfig,
    pub allowed_submitters: usize,
    pub access_management: bool,
    pub rate_limit: RateLimitConfig,
    pub progress: ProgressConfig,
    pub queue: QueueConfig,
    pub transcoder: SanitizedTranscoderConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTranscoderConfig {
    pub timeout_secs: u64,
    pub video_codec: String,
    pub audio_codec: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            broadcast: config.broadcast.clone(),
            allowed_submitters: config.access.allowed_submitters.len(),
            access_management: config.access.admin_api_key.is_some(),
            rate_limit: config.rate_limit.clone(),
            progress: config.progress.clone(),
            queue: config.queue.clone(),
            transcoder: SanitizedTranscoderConfig {
                timeout_secs: config.transcoder.timeout_secs,
                video_codec: config.transcoder.video_codec.clone(),
                audio_codec: config.transcoder.audio_codec.clone(),
            },
            cache: config.cache.clone(),
        }
    }
}
