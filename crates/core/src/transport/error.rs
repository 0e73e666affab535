//! Error types for the transport module.

use thiserror::Error;

/// Errors returned by a [`Transport`](super::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level failure talking to the remote side.
    #[error("Network error: {0}")]
    Network(String),

    /// An edit was rejected because the content did not change.
    #[error("Notice content not modified")]
    NotModified,

    /// The referenced notice, payload, or handle does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The transfer was aborted by its progress observer.
    #[error("Transfer cancelled")]
    Cancelled,

    /// The remote side rejected the request.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Local I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether a later attempt of the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Io(_))
    }
}
