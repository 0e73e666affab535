//! Progress reporting for transfers.
//!
//! [`ProgressReporter`] turns raw `(current, total)` byte callbacks into
//! paced edits of a single status notice.

mod format;
mod reporter;

pub use format::{human_bytes, human_duration, progress_bar, render, ProgressSnapshot};
pub use reporter::{ProgressConfig, ProgressReporter};
