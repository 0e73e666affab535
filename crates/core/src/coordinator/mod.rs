//! Coordinator module for the single-flight media pipeline.
//!
//! [`PipelineCoordinator`] owns the job queue and drives each job through:
//! - Transfer-in: fetching the submitted file, cancellable by the submitter
//! - Normalization: re-encoding into the target container when needed
//! - Thumbnailing and probing
//! - Transfer-out: delivery to the submitter and the broadcast destination
//!
//! Exactly one job runs at a time. Whatever the outcome, the job is removed
//! and the next one starts.
//!
//! # Example
//!
//! ```ignore
//! use vidrelay_core::coordinator::{CoordinatorConfig, PipelineCoordinator, Submission};
//!
//! let coordinator = PipelineCoordinator::new(config, transport, transcoder, cache)
//!     .with_rate_limiter(limiter);
//!
//! let receipt = coordinator.submit(submission).await?;
//! let mut events = coordinator.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

mod cleanup;
mod config;
mod error;
mod pipeline;
mod traits;
mod types;

pub use cleanup::{cleanup_workspace, delete_with_retry, wait_for_release};
pub use config::{CleanupConfig, CoordinatorConfig, QueueConfig};
pub use error::PipelineError;
pub use pipeline::PipelineCoordinator;
pub use traits::SubmissionService;
pub use types::{
    ActiveJob, CancelReport, CoordinatorStatus, JobEvent, JobOutcome, JobStage, QueuedJob,
    SubmitReceipt, Submission,
};
