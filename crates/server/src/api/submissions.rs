//! Submission and queue API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use vidrelay_core::{
    CancelReport, CoordinatorStatus, Destination, PayloadRef, PipelineError, SubmitReceipt,
    Submission, SubmitterId,
};

use crate::metrics::SUBMISSIONS_REJECTED;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for submitting a file
#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    /// Who is submitting
    pub submitter: String,
    /// Transport-specific payload location
    pub source: String,
    /// Original file name, if known
    pub file_name: Option<String>,
    /// Declared payload size in bytes
    pub size_bytes: Option<u64>,
    /// Conversation to reply in (defaults to the submitter's direct one)
    pub reply_to: Option<String>,
}

impl SubmitBody {
    fn into_submission(self) -> Submission {
        let reply_to = Destination::direct(self.reply_to.unwrap_or_else(|| self.submitter.clone()));
        let mut payload = PayloadRef::new(self.source);
        if let Some(file_name) = self.file_name {
            payload = payload.with_file_name(file_name);
        }
        if let Some(size_bytes) = self.size_bytes {
            payload = payload.with_size(size_bytes);
        }
        Submission {
            submitter: SubmitterId::new(self.submitter),
            payload,
            reply_to,
        }
    }
}

/// Response for position queries
#[derive(Debug, Serialize)]
pub struct PositionResponse {
    pub submitter: String,
    pub position: usize,
}

/// Response for cancellation
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub submitter: String,
    pub cancelled_transfer: bool,
    pub removed_jobs: Vec<String>,
}

impl CancelResponse {
    fn new(submitter: &SubmitterId, report: CancelReport) -> Self {
        Self {
            submitter: submitter.to_string(),
            cancelled_transfer: report.cancelled_transfer,
            removed_jobs: report.removed_jobs.iter().map(|id| id.to_string()).collect(),
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct SubmissionErrorResponse {
    pub error: String,
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
) -> (StatusCode, Json<SubmissionErrorResponse>) {
    (
        status,
        Json(SubmissionErrorResponse {
            error: error.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a file for processing
///
/// Returns 202 when the job was queued and 200 when it was answered from the
/// artifact cache.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitBody>,
) -> Result<(StatusCode, Json<SubmitReceipt>), impl IntoResponse> {
    if body.submitter.trim().is_empty() || body.source.trim().is_empty() {
        SUBMISSIONS_REJECTED.with_label_values(&["invalid"]).inc();
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "submitter and source are required",
        ));
    }

    let submission = body.into_submission();
    if !state.allow_list().is_allowed(&submission.submitter).await {
        SUBMISSIONS_REJECTED.with_label_values(&["forbidden"]).inc();
        warn!(submitter = %submission.submitter, "Submission from unlisted submitter");
        return Err(error_response(
            StatusCode::FORBIDDEN,
            format!("Submitter not allowed: {}", submission.submitter),
        ));
    }

    match state.service().submit(submission).await {
        Ok(receipt @ SubmitReceipt::Queued { .. }) => Ok((StatusCode::ACCEPTED, Json(receipt))),
        Ok(receipt @ SubmitReceipt::Cached { .. }) => Ok((StatusCode::OK, Json(receipt))),
        Err(e @ PipelineError::Unsupported(_)) => {
            SUBMISSIONS_REJECTED.with_label_values(&["unsupported"]).inc();
            Err(error_response(StatusCode::BAD_REQUEST, e.to_string()))
        }
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}

/// Cancel everything a submitter has pending
pub async fn cancel_jobs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<CancelResponse> {
    let submitter = SubmitterId::new(id);
    let report = state.service().cancel(&submitter).await;
    Json(CancelResponse::new(&submitter, report))
}

/// Get a submitter's queue position
pub async fn get_position(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PositionResponse>, impl IntoResponse> {
    let submitter = SubmitterId::new(id);
    match state.service().position_of(&submitter).await {
        Some(position) => Ok(Json(PositionResponse {
            submitter: submitter.to_string(),
            position,
        })),
        None => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("No pending jobs for submitter: {}", submitter),
        )),
    }
}

/// Snapshot of the running job and the queue behind it
pub async fn get_queue(State(state): State<Arc<AppState>>) -> Json<CoordinatorStatus> {
    Json(state.service().status().await)
}
