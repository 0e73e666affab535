//! Allow list management handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use vidrelay_core::{AccessError, SubmitterId};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AllowListResponse {
    pub submitters: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct AllowChangeResponse {
    pub submitter: String,
    /// Whether the list changed.
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct AccessErrorResponse {
    pub error: String,
}

type AccessResult = Result<Json<AllowChangeResponse>, (StatusCode, Json<AccessErrorResponse>)>;

fn error_response(e: AccessError) -> (StatusCode, Json<AccessErrorResponse>) {
    let status = match e {
        AccessError::InvalidSubmitter(_) => StatusCode::BAD_REQUEST,
        _ => {
            error!(error = %e, "Allow list update failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(AccessErrorResponse {
            error: e.to_string(),
        }),
    )
}

/// List allowed submitters
pub async fn list_submitters(State(state): State<Arc<AppState>>) -> Json<AllowListResponse> {
    let submitters = state.allow_list().list().await;
    Json(AllowListResponse {
        count: submitters.len(),
        submitters,
    })
}

/// Add a submitter to the allow list
pub async fn allow_submitter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AccessResult {
    let submitter = SubmitterId::new(id);
    let changed = state
        .allow_list()
        .add(&submitter)
        .await
        .map_err(error_response)?;
    Ok(Json(AllowChangeResponse {
        submitter: submitter.to_string(),
        changed,
    }))
}

/// Remove a submitter from the allow list
pub async fn remove_submitter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AccessResult {
    let submitter = SubmitterId::new(id);
    let changed = state
        .allow_list()
        .remove(&submitter)
        .await
        .map_err(error_response)?;
    Ok(Json(AllowChangeResponse {
        submitter: submitter.to_string(),
        changed,
    }))
}
