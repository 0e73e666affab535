//! Types for the queue module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::transport::Destination;

/// File name used when a payload does not carry one.
pub const DEFAULT_FILE_NAME: &str = "video.mp4";

/// Unique identifier of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of whoever submitted a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmitterId(pub String);

impl SubmitterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubmitterId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Reference to submitted media, resolved by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadRef {
    /// Transport-specific locator.
    pub source: String,
    /// Original file name, if the submission carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Declared size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl PayloadRef {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            file_name: None,
            size_bytes: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    /// File name, falling back to [`DEFAULT_FILE_NAME`].
    pub fn file_name_or_default(&self) -> &str {
        self.file_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_FILE_NAME)
    }
}

/// A unit of work: one submitted media item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub submitter: SubmitterId,
    pub payload: PayloadRef,
    /// Where notices and the result go.
    pub reply_to: Destination,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(submitter: SubmitterId, payload: PayloadRef, reply_to: Destination) -> Self {
        Self {
            id: JobId::new(),
            submitter,
            payload,
            reply_to,
            enqueued_at: Utc::now(),
        }
    }
}
