pub mod access;
pub mod cache;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod metrics;
pub mod naming;
pub mod progress;
pub mod queue;
pub mod rate_limiter;
pub mod testing;
pub mod transcoder;
pub mod transport;

pub use access::{AccessError, AllowList};
pub use cache::{ArtifactCache, CacheEntry, CacheError, SqliteArtifactCache};
pub use clock::{Clock, TokioClock};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use coordinator::{
    CancelReport, CoordinatorConfig, CoordinatorStatus, JobEvent, JobOutcome, JobStage,
    PipelineCoordinator, PipelineError, SubmissionService, SubmitReceipt, Submission,
};
pub use queue::{Job, JobId, JobQueue, PayloadRef, SubmitterId};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use transcoder::{FfmpegTranscoder, MediaInfo, Transcoder, TranscoderConfig, TranscoderError};
pub use transport::{
    Destination, DestinationKind, LocalTransport, LocalTransportConfig, MediaHandle, NoticeId,
    Transport, TransportError,
};
