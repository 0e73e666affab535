//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the vidrelay server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Submission rejections
//! - Queue snapshot gauges (collected dynamically)
//!
//! Core metrics (jobs, cache, rate limiter) are registered alongside.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "vidrelay_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vidrelay_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "vidrelay_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Submission Metrics
// =============================================================================

/// Submissions refused before admission.
pub static SUBMISSIONS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vidrelay_submissions_rejected_total",
            "Submissions refused before admission",
        ),
        &["reason"], // "forbidden", "unsupported", "invalid"
    )
    .unwrap()
});

/// Rejected calls to the allow list endpoints.
pub static ADMIN_AUTH_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vidrelay_admin_auth_failures_total",
            "Rejected allow list management requests",
        ),
        &["reason"], // "disabled", "missing_key", "invalid_key"
    )
    .unwrap()
});

/// Entries in the runtime allow list.
pub static ALLOWED_SUBMITTERS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "vidrelay_allowed_submitters",
        "Submitters on the allow list",
    )
    .unwrap()
});

// =============================================================================
// Queue Metrics (collected dynamically)
// =============================================================================

/// Submitters with at least one pending job.
pub static QUEUE_SUBMITTERS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "vidrelay_queue_submitters",
        "Submitters with pending jobs",
    )
    .unwrap()
});

/// Whether a job is currently running (1) or not (0).
pub static JOB_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("vidrelay_job_active", "Whether a job is currently running").unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Submissions
    registry
        .register(Box::new(SUBMISSIONS_REJECTED.clone()))
        .unwrap();
    registry
        .register(Box::new(ADMIN_AUTH_FAILURES.clone()))
        .unwrap();
    registry
        .register(Box::new(ALLOWED_SUBMITTERS.clone()))
        .unwrap();

    // Queue
    registry
        .register(Box::new(QUEUE_SUBMITTERS.clone()))
        .unwrap();
    registry.register(Box::new(JOB_ACTIVE.clone())).unwrap();

    // Core metrics (queue, cache, rate limiter)
    for metric in vidrelay_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the gauges reflect the current queue.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.service().status().await;
    QUEUE_SUBMITTERS.set(status.submitters as i64);
    JOB_ACTIVE.set(if status.active.is_some() { 1 } else { 0 });
    ALLOWED_SUBMITTERS.set(state.allow_list().len().await as i64);
}

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static SUBMITTER_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/submitters/[^/]+").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_SEGMENT.replace_all(path, "{id}");
    let result = SUBMITTER_SEGMENT.replace_all(&result, "/submitters/{id}");
    result.to_string()
}
