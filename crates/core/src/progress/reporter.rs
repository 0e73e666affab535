//! Throttled progress notices for a single transfer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

use super::format::{render, ProgressSnapshot};
use crate::clock::Clock;
use crate::rate_limiter::RateLimiter;
use crate::transport::{Destination, NoticeId, ProgressObserver, Transport, TransportError};

/// Progress throttling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgressConfig {
    /// Minimum percent advance between two notices (default: 5.0).
    #[serde(default = "default_percent_step")]
    pub percent_step: f64,
    /// Report at least this often in milliseconds, even without advance (default: 3000).
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_percent_step() -> f64 {
    5.0
}

fn default_interval_ms() -> u64 {
    3000
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            percent_step: default_percent_step(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl ProgressConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

struct ReporterState {
    last_percent: f64,
    last_report: Option<Instant>,
    /// Bytes transferred as of the previous report.
    last_bytes: u64,
}

/// Edits one notice in place as a transfer advances.
///
/// A notice is emitted on the first call, then whenever the percent has
/// advanced by `percent_step` or `interval` has elapsed since the previous
/// one. Every edit goes through the rate limiter.
pub struct ProgressReporter<T: Transport + ?Sized> {
    transport: Arc<T>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    destination: Destination,
    notice: NoticeId,
    action: String,
    config: ProgressConfig,
    started_at: Instant,
    state: Mutex<ReporterState>,
}

impl<T: Transport + ?Sized> ProgressReporter<T> {
    pub fn new(
        transport: Arc<T>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
        destination: Destination,
        notice: NoticeId,
        action: impl Into<String>,
        config: ProgressConfig,
    ) -> Self {
        let started_at = clock.now();
        Self {
            transport,
            limiter,
            clock,
            destination,
            notice,
            action: action.into(),
            config,
            started_at,
            state: Mutex::new(ReporterState {
                last_percent: 0.0,
                last_report: None,
                last_bytes: 0,
            }),
        }
    }

    pub fn notice(&self) -> &NoticeId {
        &self.notice
    }

    /// Record progress and edit the notice if a report is due.
    ///
    /// Returns the snapshot that was reported, or `None` when throttled.
    pub async fn update(&self, current: u64, total: u64) -> Option<ProgressSnapshot> {
        let now = self.clock.now();
        let snapshot = {
            let mut state = self.state.lock().await;

            let raw = if total == 0 {
                0.0
            } else {
                (current as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
            };
            let percent = raw.max(state.last_percent);

            let advanced = percent - state.last_percent >= self.config.percent_step;
            let interval_elapsed = state
                .last_report
                .is_none_or(|last| now.saturating_duration_since(last) >= self.config.interval());
            let reached_end = total > 0 && current >= total && state.last_percent < 100.0;
            if !(advanced || interval_elapsed || reached_end) {
                return None;
            }

            let since = state.last_report.unwrap_or(self.started_at);
            let speed = speed_between(state.last_bytes, current, since, now);
            state.last_percent = percent;
            state.last_report = Some(now);
            state.last_bytes = current;
            snapshot(percent, current, total, speed)
        };

        let text = render(&self.action, &snapshot);
        self.limiter.acquire(&self.destination).await;
        match self
            .transport
            .edit_notice(&self.destination, &self.notice, &text)
            .await
        {
            Ok(()) => {}
            Err(TransportError::NotModified) => {
                debug!(notice = %self.notice, "Progress notice unchanged");
            }
            Err(e) => {
                warn!(notice = %self.notice, error = %e, "Failed to update progress notice");
            }
        }
        Some(snapshot)
    }
}

/// Bytes per second over the window since the previous report.
fn speed_between(last_bytes: u64, current: u64, since: Instant, now: Instant) -> f64 {
    let elapsed = now.saturating_duration_since(since).as_secs_f64();
    if elapsed > 0.0 {
        current.saturating_sub(last_bytes) as f64 / elapsed
    } else {
        0.0
    }
}

fn snapshot(percent: f64, current: u64, total: u64, speed: f64) -> ProgressSnapshot {
    let remaining = total.saturating_sub(current) as f64;
    let eta = if speed > 0.0 {
        Duration::try_from_secs_f64(remaining / speed).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    };
    ProgressSnapshot {
        percent,
        current,
        total,
        speed_bytes_per_sec: speed,
        eta,
    }
}

#[async_trait]
impl<T: Transport + ?Sized> ProgressObserver for ProgressReporter<T> {
    async fn on_progress(&self, current: u64, total: u64) -> Result<(), TransportError> {
        self.update(current, total).await;
        Ok(())
    }
}
