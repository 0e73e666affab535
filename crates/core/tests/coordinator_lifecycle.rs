//! Coordinator lifecycle integration tests.
//!
//! These tests drive the pipeline coordinator with mock transport and transcoder:
//! - Single-flight execution in admission order
//! - Queue position notices and status snapshots
//! - Cancellation of running and waiting jobs
//! - Failure handling and queue advancement
//! - Artifact cache hits and stale entries
//! - Misbehaving transports that must not stall the queue

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use futures::future::join_all;
use tempfile::TempDir;
use tokio::sync::broadcast;

use vidrelay_core::{
    cache::{ArtifactCache, SqliteArtifactCache},
    coordinator::{
        JobEvent, JobOutcome, JobStage, PipelineCoordinator, PipelineError, SubmitReceipt,
    },
    queue::{JobId, PayloadRef, SubmitterId},
    testing::{fixtures, MockTranscoder, MockTransport, TransportCall},
    transcoder::TranscoderError,
    transport::{
        Destination, MediaHandle, NoticeId, OutgoingMedia, ProgressObserver, Transport,
        TransportError,
    },
    CoordinatorConfig,
};

/// Test helper wiring a coordinator to mocks and a temporary work directory.
struct TestHarness {
    coordinator: PipelineCoordinator<MockTransport, MockTranscoder>,
    transport: Arc<MockTransport>,
    transcoder: Arc<MockTranscoder>,
    cache: Arc<SqliteArtifactCache>,
    work_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let work_dir = TempDir::new().expect("Failed to create work dir");
        let transport = Arc::new(MockTransport::new());
        let transcoder = Arc::new(MockTranscoder::new());
        let cache = Arc::new(SqliteArtifactCache::in_memory().expect("Failed to open cache"));

        let coordinator = PipelineCoordinator::new(
            CoordinatorConfig::new(work_dir.path(), broadcast_destination()),
            Arc::clone(&transport),
            Arc::clone(&transcoder),
            Arc::clone(&cache) as Arc<dyn ArtifactCache>,
        );

        Self {
            coordinator,
            transport,
            transcoder,
            cache,
            work_dir,
        }
    }

    async fn submit(&self, submitter: &str, file_name: &str) -> SubmitReceipt {
        self.coordinator
            .submit(fixtures::submission(submitter, file_name))
            .await
            .expect("Submission rejected")
    }
}

fn broadcast_destination() -> Destination {
    Destination::shared("archive")
}

fn queued_id(receipt: &SubmitReceipt) -> JobId {
    match receipt {
        SubmitReceipt::Queued { job_id, .. } => *job_id,
        other => panic!("Expected queued receipt, got {:?}", other),
    }
}

/// Collect `count` finished events in the order they happen.
async fn finished(
    events: &mut broadcast::Receiver<JobEvent>,
    count: usize,
) -> Vec<(SubmitterId, JobOutcome)> {
    let mut done = Vec::new();
    while done.len() < count {
        if let JobEvent::Finished {
            submitter, outcome, ..
        } = events.recv().await.expect("Event channel closed")
        {
            done.push((submitter, outcome));
        }
    }
    done
}

async fn wait_for_stage(events: &mut broadcast::Receiver<JobEvent>, job: JobId, stage: JobStage) {
    loop {
        if let JobEvent::StageChanged { job_id, stage: s } =
            events.recv().await.expect("Event channel closed")
        {
            if job_id == job && s == stage {
                return;
            }
        }
    }
}

// =============================================================================
// Single Job Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_job_delivers_to_submitter_then_broadcast() {
    let harness = TestHarness::new();

    let outcome = harness
        .coordinator
        .process(fixtures::submission("alice", "Holiday Clip.mkv"))
        .await
        .unwrap();

    let deliveries = harness.transport.deliveries().await;
    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[0].0, Destination::direct("alice"));
    assert_eq!(deliveries[1].0, broadcast_destination());
    assert_eq!(
        outcome,
        JobOutcome::Delivered {
            handle: deliveries[1].1.clone()
        }
    );

    assert_eq!(harness.transcoder.normalize_count().await, 1);
    assert_eq!(
        harness.cache.get("Holiday Clip.mp4").unwrap(),
        Some(deliveries[1].1.clone())
    );
}

#[tokio::test(start_paused = true)]
async fn test_mp4_input_skips_normalization() {
    let harness = TestHarness::new();

    let outcome = harness
        .coordinator
        .process(fixtures::submission("alice", "clip.mp4"))
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(harness.transcoder.normalize_count().await, 0);
    assert!(harness.cache.get("clip.mp4").unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_caption_uses_cleaned_title_and_tags() {
    let harness = TestHarness::new();

    harness
        .coordinator
        .process(fixtures::submission("alice", "Big_Trip 1080p WEB-DL.mkv"))
        .await
        .unwrap();

    let captions: Vec<String> = harness
        .transport
        .recorded_calls()
        .await
        .into_iter()
        .filter_map(|call| match call {
            TransportCall::Deliver { caption, .. } => Some(caption),
            _ => None,
        })
        .collect();
    assert_eq!(captions.len(), 2);
    assert!(captions[0].starts_with("**Big Trip**"));
    assert!(captions[0].contains("**Resolution:** 1080p"));
    assert!(captions[0].contains("**Quality:** WEB-DL"));
}

#[tokio::test(start_paused = true)]
async fn test_notices_retracted_and_workspace_removed() {
    let harness = TestHarness::new();
    let mut events = harness.coordinator.subscribe();

    let receipt = harness.submit("alice", "clip.mkv").await;
    let job_id = queued_id(&receipt);
    finished(&mut events, 1).await;
    harness.coordinator.drain_background().await;

    assert!(harness.transport.live_notices().await.is_empty());
    assert!(!harness.work_dir.path().join(job_id.to_string()).exists());
}

#[tokio::test(start_paused = true)]
async fn test_transfer_progress_is_reported() {
    let harness = TestHarness::new();

    harness
        .coordinator
        .process(fixtures::submission("alice", "clip.mkv"))
        .await
        .unwrap();

    let edits = harness.transport.recorded_edits().await;
    assert!(edits
        .iter()
        .any(|(_, text)| text.starts_with("**Downloading...**") && text.contains("`100.0%`")));
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_file_is_rejected() {
    let harness = TestHarness::new();

    let result = harness
        .coordinator
        .submit(fixtures::submission("alice", "notes.pdf"))
        .await;

    assert!(matches!(result, Err(PipelineError::Unsupported(_))));
    assert!(harness.transport.recorded_calls().await.is_empty());
    assert_eq!(harness.coordinator.status().await.submitters, 0);
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_jobs_run_one_at_a_time_in_admission_order() {
    let harness = TestHarness::new();
    harness.transport.set_step_delay(Duration::from_millis(200)).await;
    let mut events = harness.coordinator.subscribe();

    let receipts = [
        harness.submit("alice", "a.mkv").await,
        harness.submit("bob", "b.mkv").await,
        harness.submit("carol", "c.mkv").await,
    ];
    let positions: Vec<usize> = receipts
        .iter()
        .map(|r| match r {
            SubmitReceipt::Queued { position, .. } => *position,
            other => panic!("Unexpected receipt {:?}", other),
        })
        .collect();
    assert_eq!(positions, vec![1, 2, 3]);

    let mut running: Option<JobId> = None;
    let mut started = Vec::new();
    let mut done = Vec::new();
    while done.len() < 3 {
        match events.recv().await.unwrap() {
            JobEvent::StageChanged {
                job_id,
                stage: JobStage::TransferringIn,
            } => {
                assert!(running.is_none(), "Two jobs ran at once");
                running = Some(job_id);
                started.push(job_id);
            }
            JobEvent::Finished { job_id, submitter, outcome } => {
                assert_eq!(running, Some(job_id));
                assert!(outcome.is_success());
                running = None;
                done.push(submitter.as_str().to_string());
            }
            _ => {}
        }
    }

    assert_eq!(started, receipts.iter().map(queued_id).collect::<Vec<_>>());
    assert_eq!(done, vec!["alice", "bob", "carol"]);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_process_calls_each_get_their_outcome() {
    let harness = TestHarness::new();
    harness.transport.set_step_delay(Duration::from_millis(50)).await;

    let outcomes = join_all(
        [("alice", "a.mkv"), ("bob", "b.mkv"), ("carol", "c.mkv")]
            .into_iter()
            .map(|(submitter, file)| {
                harness
                    .coordinator
                    .process(fixtures::submission(submitter, file))
            }),
    )
    .await;

    for outcome in outcomes {
        assert!(outcome.expect("Submission rejected").is_success());
    }
    // Each job goes to its submitter and to the broadcast destination.
    assert_eq!(harness.transport.deliveries().await.len(), 6);
    assert_eq!(harness.cache.len().unwrap(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_waiting_submitters_get_position_notice() {
    let harness = TestHarness::new();
    let mut events = harness.coordinator.subscribe();

    harness.submit("alice", "a.mkv").await;
    harness.submit("bob", "b.mkv").await;
    harness.submit("carol", "c.mkv").await;

    assert!(!harness
        .transport
        .sent_notices(&Destination::direct("alice"))
        .await
        .iter()
        .any(|text| text.contains("position")));
    assert!(harness
        .transport
        .sent_notices(&Destination::direct("bob"))
        .await
        .iter()
        .any(|text| text.contains("position 2")));
    assert!(harness
        .transport
        .sent_notices(&Destination::direct("carol"))
        .await
        .iter()
        .any(|text| text.contains("position 3")));

    finished(&mut events, 3).await;
    assert!(harness
        .transport
        .live_notices()
        .await
        .values()
        .all(|text| !text.contains("position")));
}

#[tokio::test(start_paused = true)]
async fn test_status_and_positions_while_running() {
    let harness = TestHarness::new();
    harness.transport.set_step_delay(Duration::from_secs(1)).await;
    let mut events = harness.coordinator.subscribe();

    let first = queued_id(&harness.submit("alice", "a.mkv").await);
    harness.submit("bob", "b.mkv").await;
    wait_for_stage(&mut events, first, JobStage::TransferringIn).await;

    let status = harness.coordinator.status().await;
    let active = status.active.expect("No active job");
    assert_eq!(active.job_id, first);
    assert_eq!(active.stage, JobStage::TransferringIn);
    assert_eq!(status.queued.len(), 1);
    assert_eq!(status.queued[0].submitter.as_str(), "bob");
    assert_eq!(status.queued[0].position, 2);
    assert_eq!(status.submitters, 2);

    let bob = SubmitterId::new("bob");
    assert_eq!(harness.coordinator.position_of(&bob).await, Some(2));
    finished(&mut events, 1).await;
    assert_eq!(harness.coordinator.position_of(&bob).await, Some(1));
    finished(&mut events, 1).await;
    assert_eq!(harness.coordinator.position_of(&bob).await, None);
}

// =============================================================================
// Cancellation Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_during_transfer_in() {
    let harness = TestHarness::new();
    harness.transport.set_fetch_steps(10).await;
    harness.transport.set_step_delay(Duration::from_secs(1)).await;
    let mut events = harness.coordinator.subscribe();

    let alice_job = queued_id(&harness.submit("alice", "a.mkv").await);
    harness.submit("alice", "second.mkv").await;
    harness.submit("bob", "b.mkv").await;

    wait_for_stage(&mut events, alice_job, JobStage::TransferringIn).await;
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let report = harness.coordinator.cancel(&SubmitterId::new("alice")).await;
    assert!(report.cancelled_transfer);
    assert_eq!(report.removed_jobs.len(), 2);

    let done = finished(&mut events, 3).await;
    let outcome_of = |name: &str| -> Vec<JobOutcome> {
        done.iter()
            .filter(|(s, _)| s.as_str() == name)
            .map(|(_, o)| o.clone())
            .collect()
    };
    assert_eq!(
        outcome_of("alice"),
        vec![JobOutcome::Cancelled, JobOutcome::Cancelled]
    );
    assert!(outcome_of("bob")[0].is_success());

    assert!(harness
        .transport
        .recorded_edits()
        .await
        .iter()
        .any(|(_, text)| text == "Download cancelled."));
    assert_eq!(harness.transcoder.normalize_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_waiting_jobs_retracts_position_notice() {
    let harness = TestHarness::new();
    harness.transport.set_step_delay(Duration::from_secs(1)).await;
    let mut events = harness.coordinator.subscribe();

    let alice_job = queued_id(&harness.submit("alice", "a.mkv").await);
    harness.submit("bob", "b1.mkv").await;
    harness.submit("bob", "b2.mkv").await;
    wait_for_stage(&mut events, alice_job, JobStage::TransferringIn).await;

    let report = harness.coordinator.cancel(&SubmitterId::new("bob")).await;
    assert!(!report.cancelled_transfer);
    assert_eq!(report.removed_jobs.len(), 2);
    assert!(harness
        .transport
        .live_notices()
        .await
        .values()
        .all(|text| !text.contains("position")));

    let done = finished(&mut events, 3).await;
    let alice: Vec<_> = done.iter().filter(|(s, _)| s.as_str() == "alice").collect();
    assert_eq!(alice.len(), 1);
    assert!(alice[0].1.is_success());
    assert_eq!(
        done.iter()
            .filter(|(_, o)| *o == JobOutcome::Cancelled)
            .count(),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_unknown_submitter_is_noop() {
    let harness = TestHarness::new();
    let report = harness.coordinator.cancel(&SubmitterId::new("nobody")).await;
    assert!(report.is_noop());
}

// =============================================================================
// Failure Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_normalization_failure_advances_queue() {
    let harness = TestHarness::new();
    harness
        .transcoder
        .fail_next_normalize(TranscoderError::process_failed("exit status 1", None))
        .await;
    let mut events = harness.coordinator.subscribe();

    harness.submit("alice", "a.mkv").await;
    harness.submit("bob", "b.mkv").await;

    let done = finished(&mut events, 2).await;
    assert!(matches!(
        done[0].1,
        JobOutcome::Failed {
            stage: JobStage::Normalizing,
            ..
        }
    ));
    assert!(done[1].1.is_success());

    let alice_notices = harness
        .transport
        .sent_notices(&Destination::direct("alice"))
        .await;
    assert!(alice_notices
        .iter()
        .any(|text| text == "Converting the video failed."));
    assert!(harness.cache.get("a.mp4").unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_reports_transfer_in_stage() {
    let harness = TestHarness::new();
    harness
        .transport
        .fail_next_fetch(TransportError::Network("connection reset".into()))
        .await;

    let outcome = harness
        .coordinator
        .process(fixtures::submission("alice", "a.mkv"))
        .await
        .unwrap();

    match outcome {
        JobOutcome::Failed { stage, reason } => {
            assert_eq!(stage, JobStage::TransferringIn);
            assert!(reason.contains("connection reset"));
        }
        other => panic!("Expected failure, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_delivery_failure_skips_cache() {
    let harness = TestHarness::new();
    harness
        .transport
        .fail_next_deliver(TransportError::Rejected("file too large".into()))
        .await;

    let outcome = harness
        .coordinator
        .process(fixtures::submission("alice", "clip.mp4"))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        JobOutcome::Failed {
            stage: JobStage::TransferringOut,
            ..
        }
    ));
    assert_eq!(harness.cache.len().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_thumbnail_failure_is_not_fatal() {
    let harness = TestHarness::new();
    harness
        .transcoder
        .fail_next_thumbnail(TranscoderError::process_failed("no frames", None))
        .await;

    let outcome = harness
        .coordinator
        .process(fixtures::submission("alice", "clip.mp4"))
        .await
        .unwrap();

    assert!(outcome.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_probe_failure_fails_job() {
    let harness = TestHarness::new();
    harness
        .transcoder
        .fail_next_probe(TranscoderError::probe_failed("no streams"))
        .await;

    let outcome = harness
        .coordinator
        .process(fixtures::submission("alice", "clip.mp4"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        JobOutcome::Failed {
            stage: JobStage::TransferringOut,
            reason: "Probe failed: Failed to probe media file: no streams".to_string(),
        }
    );
    assert!(harness.transport.deliveries().await.is_empty());
}

// =============================================================================
// Cache Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_cache_hit_skips_processing() {
    let harness = TestHarness::new();

    let first = harness
        .coordinator
        .process(fixtures::submission("alice", "Holiday Clip.mkv"))
        .await
        .unwrap();
    let JobOutcome::Delivered { handle } = first else {
        panic!("Expected delivery, got {:?}", first);
    };

    let receipt = harness.submit("bob", "Holiday_Clip.mkv").await;
    assert_eq!(
        receipt,
        SubmitReceipt::Cached {
            handle: handle.clone()
        }
    );

    assert_eq!(
        harness.transport.cached_deliveries().await,
        vec![(Destination::direct("bob"), handle)]
    );
    assert_eq!(harness.transcoder.normalize_count().await, 1);
    assert_eq!(
        harness
            .coordinator
            .position_of(&SubmitterId::new("bob"))
            .await,
        None
    );
}

#[tokio::test(start_paused = true)]
async fn test_stale_cache_entry_is_reprocessed() {
    let harness = TestHarness::new();
    harness
        .cache
        .put("Old Film.mp4", &MediaHandle::new("media-expired"))
        .unwrap();
    harness
        .transport
        .fail_next_deliver(TransportError::NotFound("media-expired".into()))
        .await;

    let outcome = harness
        .coordinator
        .process(fixtures::submission("alice", "Old Film.mkv"))
        .await
        .unwrap();

    let JobOutcome::Delivered { handle } = outcome else {
        panic!("Expected fresh delivery, got {:?}", outcome);
    };
    assert_ne!(handle.as_str(), "media-expired");
    assert_eq!(harness.cache.get("Old Film.mp4").unwrap(), Some(handle));
    let entry = harness.cache.entry("Old Film.mp4").unwrap().unwrap();
    assert_eq!(entry.store_count, 1);
}

// =============================================================================
// Resilience Tests
// =============================================================================

#[derive(Clone, Copy)]
enum Misbehaviour {
    /// Report one byte of an enormous total after a long pause.
    HugeTotal,
    /// Panic inside the transfer.
    Panic,
}

/// Transport that misbehaves while fetching one submitter's payloads.
struct MisbehavingTransport {
    inner: MockTransport,
    victim: String,
    mode: Misbehaviour,
}

#[async_trait]
impl Transport for MisbehavingTransport {
    fn name(&self) -> &str {
        "misbehaving"
    }

    async fn send_notice(
        &self,
        destination: &Destination,
        text: &str,
    ) -> Result<NoticeId, TransportError> {
        self.inner.send_notice(destination, text).await
    }

    async fn edit_notice(
        &self,
        destination: &Destination,
        notice: &NoticeId,
        text: &str,
    ) -> Result<(), TransportError> {
        self.inner.edit_notice(destination, notice, text).await
    }

    async fn delete_notice(
        &self,
        destination: &Destination,
        notice: &NoticeId,
    ) -> Result<(), TransportError> {
        self.inner.delete_notice(destination, notice).await
    }

    async fn fetch(
        &self,
        payload: &PayloadRef,
        target: &Path,
        progress: &dyn ProgressObserver,
    ) -> Result<u64, TransportError> {
        if payload.source.starts_with(&format!("{}/", self.victim)) {
            match self.mode {
                Misbehaviour::HugeTotal => {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    progress.on_progress(1, u64::MAX).await?;
                }
                Misbehaviour::Panic => panic!("transfer exploded"),
            }
        }
        self.inner.fetch(payload, target, progress).await
    }

    async fn deliver(
        &self,
        destination: &Destination,
        media: &OutgoingMedia,
        progress: &dyn ProgressObserver,
    ) -> Result<MediaHandle, TransportError> {
        self.inner.deliver(destination, media, progress).await
    }

    async fn deliver_cached(
        &self,
        destination: &Destination,
        handle: &MediaHandle,
        caption: &str,
    ) -> Result<(), TransportError> {
        self.inner.deliver_cached(destination, handle, caption).await
    }
}

/// Submit alice then bob through a transport that misbehaves for alice.
async fn run_with_misbehaving_transport(
    mode: Misbehaviour,
) -> (
    Vec<(SubmitterId, JobOutcome)>,
    PipelineCoordinator<MisbehavingTransport, MockTranscoder>,
) {
    let work_dir = TempDir::new().unwrap();
    let transport = Arc::new(MisbehavingTransport {
        inner: MockTransport::new(),
        victim: "alice".to_string(),
        mode,
    });
    let coordinator = PipelineCoordinator::new(
        CoordinatorConfig::new(work_dir.path(), broadcast_destination()),
        transport,
        Arc::new(MockTranscoder::new()),
        Arc::new(SqliteArtifactCache::in_memory().unwrap()) as Arc<dyn ArtifactCache>,
    );
    let mut events = coordinator.subscribe();

    coordinator
        .submit(fixtures::submission("alice", "a.mkv"))
        .await
        .unwrap();
    coordinator
        .submit(fixtures::submission("bob", "b.mkv"))
        .await
        .unwrap();

    let done = tokio::time::timeout(Duration::from_secs(3600), finished(&mut events, 2))
        .await
        .expect("Queue stalled");
    (done, coordinator)
}

#[tokio::test(start_paused = true)]
async fn test_huge_reported_total_does_not_stall_queue() {
    let (done, coordinator) = run_with_misbehaving_transport(Misbehaviour::HugeTotal).await;

    assert_eq!(done[0].0.as_str(), "alice");
    assert!(done[0].1.is_success());
    assert_eq!(done[1].0.as_str(), "bob");
    assert!(done[1].1.is_success());
    assert!(coordinator.status().await.active.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_panicking_job_fails_and_queue_advances() {
    let (done, coordinator) = run_with_misbehaving_transport(Misbehaviour::Panic).await;

    assert_eq!(done[0].0.as_str(), "alice");
    assert!(matches!(
        done[0].1,
        JobOutcome::Failed {
            stage: JobStage::TransferringIn,
            ..
        }
    ));
    assert_eq!(done[1].0.as_str(), "bob");
    assert!(done[1].1.is_success());

    let status = coordinator.status().await;
    assert!(status.active.is_none());
    assert!(status.queued.is_empty());
    assert_eq!(
        coordinator.position_of(&SubmitterId::new("alice")).await,
        None
    );
}
