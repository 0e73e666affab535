//! Types shared by transport implementations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// How a destination is rate limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    /// One-to-one conversation. Fixed minimum interval between sends.
    Direct,
    /// Group or channel. Capped number of sends per sliding window.
    Shared,
}

impl DestinationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Shared => "shared",
        }
    }
}

/// Where notices and media are sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
    pub kind: DestinationKind,
}

impl Destination {
    pub fn direct(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: DestinationKind::Direct,
        }
    }

    pub fn shared(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: DestinationKind::Shared,
        }
    }

    pub fn is_shared(&self) -> bool {
        self.kind == DestinationKind::Shared
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Identifier of a status notice previously sent through a transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoticeId(pub String);

impl fmt::Display for NoticeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle of media the transport has already delivered.
///
/// Re-delivering a handle does not transfer the bytes again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaHandle(pub String);

impl MediaHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A processed video ready for delivery.
#[derive(Debug, Clone)]
pub struct OutgoingMedia {
    /// Final artifact on disk.
    pub path: PathBuf,
    /// Optional thumbnail image.
    pub thumbnail: Option<PathBuf>,
    /// Duration in whole seconds.
    pub duration_secs: u64,
    /// Caption shown with the video.
    pub caption: String,
    pub supports_streaming: bool,
}
