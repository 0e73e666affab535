//! Job queue module.
//!
//! Holds pending jobs in admission order and the derived order of
//! submitters, which drives queue positions shown to users.

mod job_queue;
mod types;

pub use job_queue::JobQueue;
pub use types::{Job, JobId, PayloadRef, SubmitterId, DEFAULT_FILE_NAME};
