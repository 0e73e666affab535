//! Error types for the coordinator module.

use thiserror::Error;

use super::types::JobStage;
use crate::transcoder::TranscoderError;
use crate::transport::TransportError;

/// Errors that end a job or reject a submission.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The file type is not accepted.
    #[error("Unsupported file type: {0}")]
    Unsupported(String),

    /// The per-job work directory could not be prepared.
    #[error("Failed to prepare work directory: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("Transfer in failed: {0}")]
    TransferIn(#[source] TransportError),

    #[error("Normalization failed: {0}")]
    Normalization(#[source] TranscoderError),

    #[error("Probe failed: {0}")]
    Probe(#[source] TranscoderError),

    #[error("Delivery failed: {0}")]
    Delivery(#[source] TransportError),

    /// The submitter cancelled during transfer-in.
    #[error("Cancelled by submitter")]
    Cancelled,

    /// The job task ended abnormally.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Stage the job was in when this error occurred.
    ///
    /// Probing runs right before delivery and reports `TransferringOut`.
    pub fn stage(&self) -> JobStage {
        match self {
            Self::Unsupported(_) => JobStage::Admitted,
            Self::Workspace(_) | Self::TransferIn(_) | Self::Cancelled => JobStage::TransferringIn,
            Self::Normalization(_) => JobStage::Normalizing,
            Self::Probe(_) | Self::Delivery(_) => JobStage::TransferringOut,
            Self::Internal(_) => JobStage::Failed,
        }
    }

    /// Short text suitable for the submitter.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unsupported(name) => format!("The file {name} is not a supported video."),
            Self::Workspace(_) | Self::Internal(_) => {
                "Something went wrong while preparing your video. Please try again.".to_string()
            }
            Self::TransferIn(_) => "Downloading the file failed. Please try again.".to_string(),
            Self::Normalization(_) => "Converting the video failed.".to_string(),
            Self::Probe(_) => "Reading the video details failed.".to_string(),
            Self::Delivery(_) => "Uploading the video failed.".to_string(),
            Self::Cancelled => "Download cancelled.".to_string(),
        }
    }
}
