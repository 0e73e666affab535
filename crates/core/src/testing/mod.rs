//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the transport and transcoder
//! traits plus a manual clock, so the coordinator can be exercised end to end
//! without ffmpeg or a real messaging service.
//!
//! # Example
//!
//! ```rust,ignore
//! use vidrelay_core::testing::{fixtures, MockTranscoder, MockTransport};
//!
//! let transport = Arc::new(MockTransport::new());
//! let transcoder = Arc::new(MockTranscoder::new());
//!
//! // Configure mock behaviour
//! transport.fail_next_deliver(TransportError::Network("down".into())).await;
//! transcoder.set_duration(42.0).await;
//!
//! let outcome = coordinator.process(fixtures::submission("alice", "clip.mkv")).await?;
//! ```

mod manual_clock;
mod mock_transcoder;
mod mock_transport;

pub use manual_clock::ManualClock;
pub use mock_transcoder::{MockTranscoder, TranscoderCall};
pub use mock_transport::{MockTransport, TransportCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::coordinator::Submission;
    use crate::queue::{PayloadRef, SubmitterId};
    use crate::transport::Destination;

    /// Payload reference whose source is `"{submitter}/{file_name}"`.
    pub fn payload(submitter: &str, file_name: &str) -> PayloadRef {
        PayloadRef::new(format!("{}/{}", submitter, file_name)).with_file_name(file_name)
    }

    /// Submission from `submitter` replying to its direct conversation.
    pub fn submission(submitter: &str, file_name: &str) -> Submission {
        Submission {
            submitter: SubmitterId::new(submitter),
            payload: payload(submitter, file_name),
            reply_to: Destination::direct(submitter),
        }
    }

    /// Submission with a declared payload size.
    pub fn sized_submission(submitter: &str, file_name: &str, size_bytes: u64) -> Submission {
        let mut submission = submission(submitter, file_name);
        submission.payload = submission.payload.with_size(size_bytes);
        submission
    }
}
