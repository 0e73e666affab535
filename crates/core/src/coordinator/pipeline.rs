//! Pipeline coordinator implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::cleanup::cleanup_workspace;
use super::config::CoordinatorConfig;
use super::error::PipelineError;
use super::traits::SubmissionService;
use super::types::{
    ActiveJob, CancelReport, CoordinatorStatus, JobEvent, JobOutcome, JobStage, QueuedJob,
    SubmitReceipt, Submission,
};
use crate::cache::ArtifactCache;
use crate::clock::{Clock, TokioClock};
use crate::metrics;
use crate::naming;
use crate::progress::{ProgressConfig, ProgressReporter};
use crate::queue::{Job, JobId, JobQueue, SubmitterId, DEFAULT_FILE_NAME};
use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use crate::transcoder::Transcoder;
use crate::transport::{
    Destination, MediaHandle, NoProgress, NoticeId, OutgoingMedia, ProgressObserver, Transport,
    TransportError,
};

const EVENT_CAPACITY: usize = 256;
const THUMBNAIL_FILE: &str = "thumbnail.jpg";

const PROCESSING_STARTED: &str = "File received. Processing started, please wait...";
const DOWNLOADING: &str = "Downloading...";
const DOWNLOAD_CANCELLED: &str = "Download cancelled.";
const PROCESSING: &str = "Processing video...";
const NORMALIZING: &str = "Converting video to MP4...";
const THUMBNAILING: &str = "Creating thumbnail...";
const UPLOADING: &str = "Uploading...";

fn position_text(position: usize) -> String {
    format!("Your file is in the queue at position {position}. It will be processed soon.")
}

/// State shared by every clone of a coordinator.
///
/// Lock order is `queue`, then `active`. The other maps are only ever
/// locked on their own.
struct SharedState {
    queue: Mutex<JobQueue>,
    active: Mutex<Option<ActiveJob>>,
    wait_notices: Mutex<HashMap<JobId, (Destination, NoticeId)>>,
    cancellations: Mutex<HashMap<SubmitterId, CancellationToken>>,
    /// Woken whenever the head of the queue may have changed.
    turn: Notify,
    events: broadcast::Sender<JobEvent>,
    /// Detached notice retractions and work directory cleanups.
    background: TaskTracker,
}

enum Turn {
    Claimed,
    Removed,
}

enum Dispatched {
    Cached(MediaHandle),
    Queued {
        job_id: JobId,
        position: usize,
        task: JoinHandle<JobOutcome>,
    },
}

/// Runs submitted jobs one at a time, in admission order.
///
/// Each admitted job gets its own task. The task waits until its job is the
/// queue head and the single-flight slot is free, runs the stages, and then
/// always removes the job and wakes the next one, whatever the outcome.
pub struct PipelineCoordinator<T: Transport, X: Transcoder> {
    config: Arc<CoordinatorConfig>,
    progress_config: ProgressConfig,
    transport: Arc<T>,
    transcoder: Arc<X>,
    cache: Arc<dyn ArtifactCache>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    state: Arc<SharedState>,
}

impl<T: Transport, X: Transcoder> Clone for PipelineCoordinator<T, X> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            progress_config: self.progress_config.clone(),
            transport: self.transport.clone(),
            transcoder: self.transcoder.clone(),
            cache: self.cache.clone(),
            limiter: self.limiter.clone(),
            clock: self.clock.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T: Transport + 'static, X: Transcoder + 'static> PipelineCoordinator<T, X> {
    /// Create a coordinator with default pacing and the tokio clock.
    pub fn new(
        config: CoordinatorConfig,
        transport: Arc<T>,
        transcoder: Arc<X>,
        cache: Arc<dyn ArtifactCache>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config: Arc::new(config),
            progress_config: ProgressConfig::default(),
            transport,
            transcoder,
            cache,
            limiter: Arc::new(RateLimiter::new(RateLimitConfig::default())),
            clock: Arc::new(TokioClock),
            state: Arc::new(SharedState {
                queue: Mutex::new(JobQueue::new()),
                active: Mutex::new(None),
                wait_notices: Mutex::new(HashMap::new()),
                cancellations: Mutex::new(HashMap::new()),
                turn: Notify::new(),
                events,
                background: TaskTracker::new(),
            }),
        }
    }

    /// Share a rate limiter with other senders.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_progress_config(mut self, config: ProgressConfig) -> Self {
        self.progress_config = config;
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Receive lifecycle events for all jobs.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.state.events.subscribe()
    }

    /// Accept a submission: answer it from the cache or queue it.
    ///
    /// Returns as soon as the job is admitted; processing continues in the
    /// background.
    pub async fn submit(&self, submission: Submission) -> Result<SubmitReceipt, PipelineError> {
        match self.dispatch(submission).await? {
            Dispatched::Cached(handle) => Ok(SubmitReceipt::Cached { handle }),
            Dispatched::Queued {
                job_id, position, ..
            } => Ok(SubmitReceipt::Queued { job_id, position }),
        }
    }

    /// Like [`submit`](Self::submit), but waits for the job to finish.
    pub async fn process(&self, submission: Submission) -> Result<JobOutcome, PipelineError> {
        match self.dispatch(submission).await? {
            Dispatched::Cached(handle) => Ok(JobOutcome::CachedDelivery { handle }),
            Dispatched::Queued { task, .. } => task
                .await
                .map_err(|e| PipelineError::Internal(e.to_string())),
        }
    }

    /// Cancel everything a submitter has pending.
    ///
    /// Signals an in-flight transfer-in, removes all of the submitter's jobs
    /// and retracts their queue position notices. Unknown submitters are a
    /// no-op.
    pub async fn cancel(&self, submitter: &SubmitterId) -> CancelReport {
        let token = self.state.cancellations.lock().await.get(submitter).cloned();
        let cancelled_transfer = match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        };

        let removed_jobs = {
            let mut queue = self.state.queue.lock().await;
            let removed = queue.cancel_all(submitter);
            metrics::QUEUE_DEPTH.set(queue.len() as i64);
            removed
        };

        for job_id in &removed_jobs {
            self.retract_wait_notice(*job_id).await;
        }
        self.state.turn.notify_waiters();

        let report = CancelReport {
            cancelled_transfer,
            removed_jobs,
        };
        if report.is_noop() {
            debug!(submitter = %submitter, "Nothing to cancel");
        } else {
            info!(
                submitter = %submitter,
                cancelled_transfer = report.cancelled_transfer,
                removed = report.removed_jobs.len(),
                "Cancelled submitter jobs"
            );
        }
        report
    }

    /// Submitter's 1-based queue position.
    pub async fn position_of(&self, submitter: &SubmitterId) -> Option<usize> {
        self.state.queue.lock().await.position_of(submitter)
    }

    /// Snapshot of the running job and everything behind it.
    pub async fn status(&self) -> CoordinatorStatus {
        let queue = self.state.queue.lock().await;
        let active = self.state.active.lock().await.clone();
        let queued = queue
            .jobs()
            .into_iter()
            .filter(|job| active.as_ref().is_none_or(|a| a.job_id != job.id))
            .map(|job| QueuedJob {
                position: queue.position_of(&job.submitter).unwrap_or(0),
                job_id: job.id,
                file_name: job.payload.file_name_or_default().to_string(),
                submitter: job.submitter,
                enqueued_at: job.enqueued_at,
            })
            .collect();
        CoordinatorStatus {
            active,
            queued,
            submitters: queue.submitter_count(),
        }
    }

    /// Wait for detached retractions and cleanups started so far.
    pub async fn drain_background(&self) {
        self.state.background.close();
        self.state.background.wait().await;
        self.state.background.reopen();
    }

    async fn dispatch(&self, submission: Submission) -> Result<Dispatched, PipelineError> {
        let file_name = submission.payload.file_name_or_default().to_string();
        if !naming::is_supported_video(&file_name) {
            return Err(PipelineError::Unsupported(file_name));
        }

        let cache_key = naming::normalized_id(&file_name, &self.config.queue.target_container);
        if let Some(handle) = self
            .deliver_from_cache(&submission.reply_to, &cache_key, &file_name)
            .await
        {
            return Ok(Dispatched::Cached(handle));
        }

        let job = Job::new(
            submission.submitter,
            submission.payload,
            submission.reply_to,
        );
        let job_id = job.id;
        let position = {
            let mut queue = self.state.queue.lock().await;
            let position = queue.admit(job.clone());
            metrics::QUEUE_DEPTH.set(queue.len() as i64);
            position
        };
        metrics::JOBS_ADMITTED.inc();
        info!(
            job_id = %job_id,
            submitter = %job.submitter,
            position,
            file = %file_name,
            "Job admitted"
        );
        self.emit(JobEvent::Admitted {
            job_id,
            submitter: job.submitter.clone(),
            position,
        });

        if position > 1 {
            if let Some(notice) = self.notify(&job.reply_to, &position_text(position)).await {
                self.state
                    .wait_notices
                    .lock()
                    .await
                    .insert(job_id, (job.reply_to.clone(), notice));
            }
        }

        let coordinator = self.clone();
        let task = tokio::spawn(async move { coordinator.drive(job).await });
        Ok(Dispatched::Queued {
            job_id,
            position,
            task,
        })
    }

    /// Re-send an already delivered title. A failed re-send drops the stale
    /// entry so the submission is processed again.
    async fn deliver_from_cache(
        &self,
        reply_to: &Destination,
        cache_key: &str,
        file_name: &str,
    ) -> Option<MediaHandle> {
        let handle = match self.cache.get(cache_key) {
            Ok(Some(handle)) => handle,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = cache_key, error = %e, "Cache lookup failed");
                return None;
            }
        };

        let caption = naming::build_caption(file_name);
        self.limiter.acquire(reply_to).await;
        match self
            .transport
            .deliver_cached(reply_to, &handle, &caption)
            .await
        {
            Ok(()) => {
                metrics::CACHE_HITS.inc();
                metrics::JOBS_FINISHED.with_label_values(&["cached"]).inc();
                info!(key = cache_key, handle = %handle, destination = %reply_to, "Delivered from cache");
                Some(handle)
            }
            Err(e) => {
                warn!(key = cache_key, error = %e, "Cached delivery failed, processing again");
                if let Err(e) = self.cache.remove(cache_key) {
                    warn!(key = cache_key, error = %e, "Failed to drop stale cache entry");
                }
                None
            }
        }
    }

    async fn drive(&self, job: Job) -> JobOutcome {
        let outcome = match self.wait_for_turn(&job).await {
            Turn::Claimed => self.run_isolated(&job).await,
            Turn::Removed => {
                self.retract_wait_notice(job.id).await;
                info!(job_id = %job.id, "Job removed while waiting");
                JobOutcome::Cancelled
            }
        };
        self.finish(&job, &outcome).await;
        outcome
    }

    /// Run the claimed job in its own task so a panic in a stage still ends
    /// in `finish` and the queue advances.
    async fn run_isolated(&self, job: &Job) -> JobOutcome {
        let coordinator = self.clone();
        let claimed = job.clone();
        let err = match tokio::spawn(async move { coordinator.run(&claimed).await }).await {
            Ok(outcome) => return outcome,
            Err(e) => e,
        };

        let stage = self
            .state
            .active
            .lock()
            .await
            .as_ref()
            .filter(|a| a.job_id == job.id)
            .map_or(JobStage::TransferringIn, |a| a.stage);
        error!(job_id = %job.id, stage = stage.as_str(), error = %err, "Job task aborted");

        self.state.cancellations.lock().await.remove(&job.submitter);
        self.schedule_cleanup(self.config.work_dir.join(job.id.to_string()));
        self.set_stage(job, JobStage::Failed).await;
        let failure = PipelineError::Internal(err.to_string());
        self.notify(&job.reply_to, &failure.user_message()).await;
        JobOutcome::Failed {
            stage,
            reason: failure.to_string(),
        }
    }

    async fn wait_for_turn(&self, job: &Job) -> Turn {
        let mut announced = false;
        loop {
            let notified = self.state.turn.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let queue = self.state.queue.lock().await;
                if !queue.contains(job.id) {
                    return Turn::Removed;
                }
                if queue.is_head(job.id) {
                    let mut active = self.state.active.lock().await;
                    if active.is_none() {
                        *active = Some(ActiveJob::from_job(job));
                        return Turn::Claimed;
                    }
                }
            }

            if !announced {
                announced = true;
                debug!(job_id = %job.id, "Waiting for turn");
                self.emit(JobEvent::StageChanged {
                    job_id: job.id,
                    stage: JobStage::Waiting,
                });
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = self.clock.sleep(self.config.queue.poll_interval()) => {}
            }
        }
    }

    async fn run(&self, job: &Job) -> JobOutcome {
        let started = self.clock.now();
        info!(job_id = %job.id, submitter = %job.submitter, "Job started");

        self.retract_wait_notice(job.id).await;
        self.flash(&job.reply_to, PROCESSING_STARTED).await;

        let work_dir = self.config.work_dir.join(job.id.to_string());
        let result = match tokio::fs::create_dir_all(&work_dir).await {
            Ok(()) => self.run_stages(job, &work_dir).await,
            Err(e) => Err(PipelineError::Workspace(e)),
        };
        self.schedule_cleanup(work_dir);

        let outcome = match result {
            Ok(handle) => {
                self.set_stage(job, JobStage::Done).await;
                info!(job_id = %job.id, handle = %handle, "Job delivered");
                JobOutcome::Delivered { handle }
            }
            Err(PipelineError::Cancelled) => {
                self.set_stage(job, JobStage::Cancelled).await;
                info!(job_id = %job.id, "Job cancelled during transfer-in");
                JobOutcome::Cancelled
            }
            Err(e) => {
                let stage = e.stage();
                error!(job_id = %job.id, stage = stage.as_str(), error = %e, "Job failed");
                self.set_stage(job, JobStage::Failed).await;
                self.notify(&job.reply_to, &e.user_message()).await;
                JobOutcome::Failed {
                    stage,
                    reason: e.to_string(),
                }
            }
        };

        let elapsed = self.clock.now().saturating_duration_since(started);
        metrics::JOB_DURATION
            .with_label_values(&[outcome.label()])
            .observe(elapsed.as_secs_f64());
        outcome
    }

    async fn run_stages(&self, job: &Job, work_dir: &Path) -> Result<MediaHandle, PipelineError> {
        let cleaned = naming::clean_file_name(job.payload.file_name_or_default());
        let local_name = if cleaned.is_empty() {
            DEFAULT_FILE_NAME.to_string()
        } else {
            cleaned
        };
        let source = work_dir.join(&local_name);

        self.set_stage(job, JobStage::TransferringIn).await;
        self.transfer_in(job, &source).await?;

        let status = self.notify(&job.reply_to, PROCESSING).await;
        let result = self
            .process_and_deliver(job, work_dir, &source, &local_name, status.as_ref())
            .await;
        if let Some(notice) = &status {
            self.retract(&job.reply_to, notice).await;
        }
        result
    }

    async fn transfer_in(&self, job: &Job, target: &Path) -> Result<u64, PipelineError> {
        let token = CancellationToken::new();
        self.state
            .cancellations
            .lock()
            .await
            .insert(job.submitter.clone(), token.clone());
        // A cancel that landed between claiming the slot and registering the token.
        if !self.state.queue.lock().await.contains(job.id) {
            token.cancel();
        }

        let result = self.fetch_with_progress(job, target, &token).await;
        self.state.cancellations.lock().await.remove(&job.submitter);
        result
    }

    async fn fetch_with_progress(
        &self,
        job: &Job,
        target: &Path,
        token: &CancellationToken,
    ) -> Result<u64, PipelineError> {
        let destination = &job.reply_to;
        let notice = self.notify(destination, DOWNLOADING).await;
        let reporter = notice.as_ref().map(|notice| self.reporter(destination, notice, DOWNLOADING));
        let observer = CancellableObserver {
            token,
            inner: reporter.as_ref().map(|r| r as &dyn ProgressObserver),
        };

        let result = match self.transport.fetch(&job.payload, target, &observer).await {
            Ok(_) if token.is_cancelled() => Err(PipelineError::Cancelled),
            Ok(bytes) => {
                info!(job_id = %job.id, bytes, "Transfer in complete");
                Ok(bytes)
            }
            Err(TransportError::Cancelled) => Err(PipelineError::Cancelled),
            Err(e) => Err(PipelineError::TransferIn(e)),
        };

        if let Some(notice) = notice {
            if matches!(result, Err(PipelineError::Cancelled)) {
                self.edit(destination, &notice, DOWNLOAD_CANCELLED).await;
                self.retract_later(destination.clone(), notice);
            } else {
                self.retract(destination, &notice).await;
            }
        }
        result
    }

    async fn process_and_deliver(
        &self,
        job: &Job,
        work_dir: &Path,
        source: &Path,
        local_name: &str,
        status: Option<&NoticeId>,
    ) -> Result<MediaHandle, PipelineError> {
        let target = &self.config.queue.target_container;
        let final_name = naming::normalized_id(local_name, target);

        let final_path = if naming::needs_normalization(local_name, target) {
            self.set_stage(job, JobStage::Normalizing).await;
            self.update_status(&job.reply_to, status, NORMALIZING).await;
            let output = work_dir.join(&final_name);
            self.transcoder
                .normalize(source, &output)
                .await
                .map_err(PipelineError::Normalization)?;
            output
        } else {
            source.to_path_buf()
        };

        self.set_stage(job, JobStage::Thumbnailing).await;
        self.update_status(&job.reply_to, status, THUMBNAILING).await;
        let thumbnail_path = work_dir.join(THUMBNAIL_FILE);
        let thumbnail = match self
            .transcoder
            .extract_thumbnail(
                &final_path,
                &thumbnail_path,
                self.config.queue.thumbnail_offset_secs,
            )
            .await
        {
            Ok(()) => Some(thumbnail_path),
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Thumbnail extraction failed, continuing without");
                None
            }
        };

        let info = self
            .transcoder
            .probe(&final_path)
            .await
            .map_err(PipelineError::Probe)?;

        self.set_stage(job, JobStage::TransferringOut).await;
        self.update_status(&job.reply_to, status, UPLOADING).await;
        let media = OutgoingMedia {
            path: final_path,
            thumbnail,
            duration_secs: info.whole_seconds(),
            caption: naming::build_caption(local_name),
            supports_streaming: true,
        };
        let handle = self.deliver(job, &media, status).await?;

        if let Err(e) = self.cache.put(&final_name, &handle) {
            warn!(key = %final_name, error = %e, "Failed to store cache entry");
        }
        Ok(handle)
    }

    /// Deliver to the submitter with upload progress, then to the broadcast
    /// destination. Returns the broadcast handle.
    async fn deliver(
        &self,
        job: &Job,
        media: &OutgoingMedia,
        status: Option<&NoticeId>,
    ) -> Result<MediaHandle, PipelineError> {
        let reporter = status.map(|notice| self.reporter(&job.reply_to, notice, UPLOADING));
        let observer: &dyn ProgressObserver = match &reporter {
            Some(reporter) => reporter,
            None => &NoProgress,
        };

        self.limiter.acquire(&job.reply_to).await;
        self.transport
            .deliver(&job.reply_to, media, observer)
            .await
            .map_err(PipelineError::Delivery)?;

        let broadcast = &self.config.broadcast;
        self.limiter.acquire(broadcast).await;
        let handle = self
            .transport
            .deliver(broadcast, media, &NoProgress)
            .await
            .map_err(PipelineError::Delivery)?;
        debug!(job_id = %job.id, destination = %broadcast, handle = %handle, "Broadcast copy delivered");
        Ok(handle)
    }

    async fn finish(&self, job: &Job, outcome: &JobOutcome) {
        let remaining = {
            let mut queue = self.state.queue.lock().await;
            queue.complete(job.id, &job.submitter);
            let mut active = self.state.active.lock().await;
            if active.as_ref().is_some_and(|a| a.job_id == job.id) {
                *active = None;
            }
            metrics::QUEUE_DEPTH.set(queue.len() as i64);
            queue.len()
        };

        metrics::JOBS_FINISHED
            .with_label_values(&[outcome.label()])
            .inc();
        self.emit(JobEvent::Finished {
            job_id: job.id,
            submitter: job.submitter.clone(),
            outcome: outcome.clone(),
        });
        debug!(job_id = %job.id, remaining, "Advancing queue");
        self.state.turn.notify_waiters();
    }

    async fn set_stage(&self, job: &Job, stage: JobStage) {
        {
            let mut active = self.state.active.lock().await;
            if let Some(current) = active.as_mut().filter(|a| a.job_id == job.id) {
                current.stage = stage;
            }
        }
        debug!(job_id = %job.id, stage = stage.as_str(), "Stage changed");
        self.emit(JobEvent::StageChanged {
            job_id: job.id,
            stage,
        });
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.state.events.send(event);
    }

    fn reporter(
        &self,
        destination: &Destination,
        notice: &NoticeId,
        action: &str,
    ) -> ProgressReporter<T> {
        ProgressReporter::new(
            self.transport.clone(),
            self.limiter.clone(),
            self.clock.clone(),
            destination.clone(),
            notice.clone(),
            action,
            self.progress_config.clone(),
        )
    }

    /// Send a notice. Failures are logged and yield `None`.
    async fn notify(&self, destination: &Destination, text: &str) -> Option<NoticeId> {
        self.limiter.acquire(destination).await;
        match self.transport.send_notice(destination, text).await {
            Ok(notice) => Some(notice),
            Err(e) => {
                warn!(destination = %destination, error = %e, "Failed to send notice");
                None
            }
        }
    }

    async fn edit(&self, destination: &Destination, notice: &NoticeId, text: &str) {
        self.limiter.acquire(destination).await;
        match self.transport.edit_notice(destination, notice, text).await {
            Ok(()) | Err(TransportError::NotModified) => {}
            Err(e) => warn!(notice = %notice, error = %e, "Failed to edit notice"),
        }
    }

    async fn update_status(&self, destination: &Destination, status: Option<&NoticeId>, text: &str) {
        if let Some(notice) = status {
            self.edit(destination, notice, text).await;
        }
    }

    async fn retract(&self, destination: &Destination, notice: &NoticeId) {
        self.limiter.acquire(destination).await;
        if let Err(e) = self.transport.delete_notice(destination, notice).await {
            debug!(notice = %notice, error = %e, "Failed to delete notice");
        }
    }

    /// Send a notice that removes itself after the retract delay.
    async fn flash(&self, destination: &Destination, text: &str) {
        if let Some(notice) = self.notify(destination, text).await {
            self.retract_later(destination.clone(), notice);
        }
    }

    fn retract_later(&self, destination: Destination, notice: NoticeId) {
        let transport = self.transport.clone();
        let limiter = self.limiter.clone();
        let clock = self.clock.clone();
        let delay = self.config.queue.notice_retract_delay();
        self.state.background.spawn(async move {
            clock.sleep(delay).await;
            limiter.acquire(&destination).await;
            if let Err(e) = transport.delete_notice(&destination, &notice).await {
                debug!(notice = %notice, error = %e, "Failed to delete notice");
            }
        });
    }

    async fn retract_wait_notice(&self, job_id: JobId) {
        let entry = self.state.wait_notices.lock().await.remove(&job_id);
        if let Some((destination, notice)) = entry {
            self.retract(&destination, &notice).await;
        }
    }

    fn schedule_cleanup(&self, work_dir: PathBuf) {
        let config = self.config.cleanup.clone();
        let clock = self.clock.clone();
        self.state.background.spawn(async move {
            cleanup_workspace(&work_dir, &config, clock).await;
        });
    }
}

#[async_trait]
impl<T: Transport + 'static, X: Transcoder + 'static> SubmissionService
    for PipelineCoordinator<T, X>
{
    async fn submit(&self, submission: Submission) -> Result<SubmitReceipt, PipelineError> {
        PipelineCoordinator::submit(self, submission).await
    }

    async fn cancel(&self, submitter: &SubmitterId) -> CancelReport {
        PipelineCoordinator::cancel(self, submitter).await
    }

    async fn position_of(&self, submitter: &SubmitterId) -> Option<usize> {
        PipelineCoordinator::position_of(self, submitter).await
    }

    async fn status(&self) -> CoordinatorStatus {
        PipelineCoordinator::status(self).await
    }
}

/// Aborts a transfer once the submitter's token is cancelled.
struct CancellableObserver<'a> {
    token: &'a CancellationToken,
    inner: Option<&'a dyn ProgressObserver>,
}

#[async_trait]
impl<'a> ProgressObserver for CancellableObserver<'a> {
    async fn on_progress(&self, current: u64, total: u64) -> Result<(), TransportError> {
        if self.token.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        match self.inner {
            Some(inner) => inner.on_progress(current, total).await,
            None => Ok(()),
        }
    }
}
