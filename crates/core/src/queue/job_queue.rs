//! Ordered pending jobs plus the submitter order derived from them.

use std::collections::VecDeque;

use super::types::{Job, JobId, SubmitterId};

/// Pending jobs in admission order.
///
/// A submitter appears in the submitter order exactly while at least one of
/// their jobs is pending. Not synchronized; the coordinator owns it behind a
/// single lock.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: VecDeque<Job>,
    submitters: Vec<SubmitterId>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job and return its submitter's 1-based position.
    pub fn admit(&mut self, job: Job) -> usize {
        let position = match self.submitter_index(&job.submitter) {
            Some(index) => index + 1,
            None => {
                self.submitters.push(job.submitter.clone());
                self.submitters.len()
            }
        };
        self.jobs.push_back(job);
        position
    }

    /// Whether `job_id` is at the front of the queue.
    pub fn is_head(&self, job_id: JobId) -> bool {
        self.jobs.front().is_some_and(|job| job.id == job_id)
    }

    pub fn is_first_submitter(&self, submitter: &SubmitterId) -> bool {
        self.submitters.first() == Some(submitter)
    }

    /// 1-based position of a submitter.
    pub fn position_of(&self, submitter: &SubmitterId) -> Option<usize> {
        self.submitter_index(submitter).map(|index| index + 1)
    }

    /// Remove one job. Unknown ids are ignored.
    ///
    /// Returns `true` when this removed the submitter's last pending job.
    pub fn complete(&mut self, job_id: JobId, submitter: &SubmitterId) -> bool {
        let Some(index) = self.jobs.iter().position(|job| job.id == job_id) else {
            return false;
        };
        self.jobs.remove(index);

        if self.jobs.iter().any(|job| &job.submitter == submitter) {
            return false;
        }
        match self.submitter_index(submitter) {
            Some(index) => {
                self.submitters.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove every job of a submitter, returning the removed ids in queue order.
    pub fn cancel_all(&mut self, submitter: &SubmitterId) -> Vec<JobId> {
        let mut removed = Vec::new();
        self.jobs.retain(|job| {
            if &job.submitter == submitter {
                removed.push(job.id);
                false
            } else {
                true
            }
        });
        self.submitters.retain(|s| s != submitter);
        removed
    }

    pub fn contains(&self, job_id: JobId) -> bool {
        self.jobs.iter().any(|job| job.id == job_id)
    }

    pub fn head(&self) -> Option<&Job> {
        self.jobs.front()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn submitter_count(&self) -> usize {
        self.submitters.len()
    }

    /// Snapshot of pending jobs in order.
    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.iter().cloned().collect()
    }

    fn submitter_index(&self, submitter: &SubmitterId) -> Option<usize> {
        self.submitters.iter().position(|s| s == submitter)
    }
}
