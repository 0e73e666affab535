//! Types for the coordinator module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::queue::{Job, JobId, PayloadRef, SubmitterId};
use crate::transport::{Destination, MediaHandle};

/// A request to process one media item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub submitter: SubmitterId,
    pub payload: PayloadRef,
    /// Where notices and the result go.
    pub reply_to: Destination,
}

/// What `submit` did with a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitReceipt {
    /// Already processed before; re-sent from the cache without queueing.
    Cached { handle: MediaHandle },
    /// Admitted; `position` is the submitter's 1-based place in line.
    Queued { job_id: JobId, position: usize },
}

/// Lifecycle stage of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Admitted,
    Waiting,
    TransferringIn,
    Normalizing,
    Thumbnailing,
    TransferringOut,
    Done,
    Failed,
    Cancelled,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::Waiting => "waiting",
            Self::TransferringIn => "transferring_in",
            Self::Normalizing => "normalizing",
            Self::Thumbnailing => "thumbnailing",
            Self::TransferringOut => "transferring_out",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the job can no longer change stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    /// Processed and delivered; `handle` is the broadcast copy.
    Delivered { handle: MediaHandle },
    /// Re-sent from the cache.
    CachedDelivery { handle: MediaHandle },
    /// A stage failed; the queue moved on.
    Failed { stage: JobStage, reason: String },
    /// The submitter cancelled.
    Cancelled,
}

impl JobOutcome {
    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "delivered",
            Self::CachedDelivery { .. } => "cached",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered { .. } | Self::CachedDelivery { .. })
    }
}

/// Lifecycle notifications for subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Admitted {
        job_id: JobId,
        submitter: SubmitterId,
        position: usize,
    },
    StageChanged {
        job_id: JobId,
        stage: JobStage,
    },
    Finished {
        job_id: JobId,
        submitter: SubmitterId,
        outcome: JobOutcome,
    },
}

/// The job currently holding the single-flight slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveJob {
    pub job_id: JobId,
    pub submitter: SubmitterId,
    pub file_name: String,
    pub stage: JobStage,
    pub started_at: DateTime<Utc>,
}

impl ActiveJob {
    pub(crate) fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            submitter: job.submitter.clone(),
            file_name: job.payload.file_name_or_default().to_string(),
            stage: JobStage::TransferringIn,
            started_at: Utc::now(),
        }
    }
}

/// A pending job as reported by status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job_id: JobId,
    pub submitter: SubmitterId,
    pub file_name: String,
    /// Submitter's 1-based position.
    pub position: usize,
    pub enqueued_at: DateTime<Utc>,
}

/// Snapshot of the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<ActiveJob>,
    pub queued: Vec<QueuedJob>,
    pub submitters: usize,
}

/// What a cancellation affected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CancelReport {
    /// An in-flight transfer-in was signalled.
    pub cancelled_transfer: bool,
    /// Jobs removed from the queue, in queue order.
    pub removed_jobs: Vec<JobId>,
}

impl CancelReport {
    /// Whether the cancellation touched anything.
    pub fn is_noop(&self) -> bool {
        !self.cancelled_transfer && self.removed_jobs.is_empty()
    }
}
