//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Queue (admissions, depth, outcomes, job duration)
//! - Artifact cache (hits)
//! - Rate limiter (delayed sends)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Queue Metrics
// =============================================================================

/// Jobs admitted to the queue.
pub static JOBS_ADMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("vidrelay_jobs_admitted_total", "Total jobs admitted to the queue").unwrap()
});

/// Jobs finished by outcome.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vidrelay_jobs_finished_total", "Total jobs finished"),
        &["outcome"], // "delivered", "cached", "failed", "cancelled"
    )
    .unwrap()
});

/// Jobs currently pending, including the active one.
pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("vidrelay_queue_depth", "Jobs currently in the queue").unwrap()
});

/// Time from claiming the head to finishing, in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "vidrelay_job_duration_seconds",
            "Duration of a job once it started running",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]),
        &["outcome"],
    )
    .unwrap()
});

// =============================================================================
// Cache Metrics
// =============================================================================

/// Submissions answered from the artifact cache.
pub static CACHE_HITS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "vidrelay_cache_hits_total",
        "Submissions delivered from the artifact cache",
    )
    .unwrap()
});

// =============================================================================
// Rate Limiter Metrics
// =============================================================================

/// Sends that had to wait for the rate limiter.
pub static RATE_LIMIT_WAITS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vidrelay_rate_limit_waits_total",
            "Sends delayed by the rate limiter",
        ),
        &["kind"], // "direct", "shared"
    )
    .unwrap()
});

/// All core metrics, for registration with a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Queue
        Box::new(JOBS_ADMITTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(JOB_DURATION.clone()),
        // Cache
        Box::new(CACHE_HITS.clone()),
        // Rate limiter
        Box::new(RATE_LIMIT_WAITS.clone()),
    ]
}
