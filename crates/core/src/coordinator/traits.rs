//! Trait definitions for the coordinator module.

use async_trait::async_trait;

use super::error::PipelineError;
use super::types::{CancelReport, CoordinatorStatus, SubmitReceipt, Submission};
use crate::queue::SubmitterId;

/// Command surface over a coordinator, object safe for use behind `Arc<dyn _>`.
#[async_trait]
pub trait SubmissionService: Send + Sync {
    /// Accept a submission.
    async fn submit(&self, submission: Submission) -> Result<SubmitReceipt, PipelineError>;

    /// Cancel everything a submitter has pending.
    async fn cancel(&self, submitter: &SubmitterId) -> CancelReport;

    /// Submitter's 1-based queue position.
    async fn position_of(&self, submitter: &SubmitterId) -> Option<usize>;

    /// Snapshot of the queue.
    async fn status(&self) -> CoordinatorStatus;
}
