//! Per-destination send pacing.
//!
//! Direct destinations get a fixed minimum interval between sends. Shared
//! destinations get a sliding window with a capped number of sends. Callers
//! reserve their slot under the lock and then sleep outside it, so
//! concurrent senders to one destination are spread out instead of all
//! waking at the same instant.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::clock::{Clock, TokioClock};
use crate::metrics;
use crate::transport::{Destination, DestinationKind};

/// Direct entries idle for longer than this are dropped by [`RateLimiter::cleanup`].
const IDLE_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Minimum interval between sends to one direct destination (default: 1000).
    #[serde(default = "default_direct_interval_ms")]
    pub direct_interval_ms: u64,
    /// Maximum sends per window to one shared destination (default: 20).
    #[serde(default = "default_shared_max_sends")]
    pub shared_max_sends: usize,
    /// Length of the shared sliding window in seconds (default: 60).
    #[serde(default = "default_shared_window_secs")]
    pub shared_window_secs: u64,
}

fn default_direct_interval_ms() -> u64 {
    1000
}

fn default_shared_max_sends() -> usize {
    20
}

fn default_shared_window_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            direct_interval_ms: default_direct_interval_ms(),
            shared_max_sends: default_shared_max_sends(),
            shared_window_secs: default_shared_window_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn direct_interval(&self) -> Duration {
        Duration::from_millis(self.direct_interval_ms)
    }

    pub fn shared_window(&self) -> Duration {
        Duration::from_secs(self.shared_window_secs)
    }
}

#[derive(Default)]
struct Windows {
    /// Latest reserved send per direct destination.
    direct: HashMap<String, Instant>,
    /// Reserved sends per shared destination, oldest first.
    shared: HashMap<String, VecDeque<Instant>>,
}

/// Paces sends so no destination exceeds its external rate ceiling.
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    /// Create a limiter backed by the tokio timer.
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(TokioClock))
    }

    /// Create a limiter with an explicit time source.
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            windows: Mutex::new(Windows::default()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Wait until a send to `destination` is allowed and record it.
    ///
    /// Returns how long the caller was held back.
    pub async fn acquire(&self, destination: &Destination) -> Duration {
        let now = self.clock.now();
        let slot = {
            let mut windows = self.windows.lock().await;
            match destination.kind {
                DestinationKind::Direct => {
                    let slot = match windows.direct.get(&destination.id) {
                        Some(last) => (*last + self.config.direct_interval()).max(now),
                        None => now,
                    };
                    windows.direct.insert(destination.id.clone(), slot);
                    slot
                }
                DestinationKind::Shared => {
                    let window = self.config.shared_window();
                    let cap = self.config.shared_max_sends.max(1);
                    let sends = windows.shared.entry(destination.id.clone()).or_default();

                    prune(sends, now, window);

                    // Reservations stay ordered so the front is always the oldest.
                    let mut slot = sends.back().map_or(now, |last| (*last).max(now));
                    if sends.len() >= cap {
                        slot = slot.max(sends[sends.len() - cap] + window);
                    }
                    sends.push_back(slot);
                    while sends.len() > cap {
                        sends.pop_front();
                    }
                    slot
                }
            }
        };

        let wait = slot.saturating_duration_since(now);
        if !wait.is_zero() {
            debug!(
                destination = %destination,
                wait_ms = wait.as_millis() as u64,
                "Rate limit reached, delaying send"
            );
            metrics::RATE_LIMIT_WAITS
                .with_label_values(&[destination.kind.as_str()])
                .inc();
            self.clock.sleep_until(slot).await;
        }
        wait
    }

    /// Drop emptied shared windows and direct entries idle for over an hour.
    pub async fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let window = self.config.shared_window();
        let mut windows = self.windows.lock().await;
        let before = windows.direct.len() + windows.shared.len();

        windows.shared.retain(|_, sends| {
            prune(sends, now, window);
            !sends.is_empty()
        });
        windows
            .direct
            .retain(|_, last| now.saturating_duration_since(*last) <= IDLE_RETENTION);

        let removed = before - (windows.direct.len() + windows.shared.len());
        if removed > 0 {
            debug!(removed, "Dropped idle rate limit windows");
        }
        removed
    }

    /// Number of destinations with recorded send history.
    pub async fn tracked_destinations(&self) -> usize {
        let windows = self.windows.lock().await;
        windows.direct.len() + windows.shared.len()
    }
}

fn prune(sends: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(front) = sends.front() {
        if now.saturating_duration_since(*front) >= window {
            sends.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualClock;

    fn limiter(config: RateLimitConfig) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (RateLimiter::with_clock(config, clock.clone()), clock)
    }

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.direct_interval(), Duration::from_secs(1));
        assert_eq!(config.shared_max_sends, 20);
        assert_eq!(config.shared_window(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_first_send_is_immediate() {
        let (limiter, _clock) = limiter(RateLimitConfig::default());
        let waited = limiter.acquire(&Destination::direct("alice")).await;
        assert_eq!(waited, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_direct_sends_are_spaced_by_interval() {
        let (limiter, clock) = limiter(RateLimitConfig::default());
        let dest = Destination::direct("alice");

        let mut sent_at = Vec::new();
        for _ in 0..5 {
            limiter.acquire(&dest).await;
            sent_at.push(clock.now());
        }

        for pair in sent_at.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(1));
        }
    }

    #[tokio::test]
    async fn test_direct_no_wait_after_interval_elapsed() {
        let (limiter, clock) = limiter(RateLimitConfig::default());
        let dest = Destination::direct("alice");

        limiter.acquire(&dest).await;
        clock.advance(Duration::from_millis(1500));
        let waited = limiter.acquire(&dest).await;
        assert_eq!(waited, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_shared_window_never_exceeds_cap() {
        let config = RateLimitConfig {
            shared_max_sends: 3,
            shared_window_secs: 10,
            ..Default::default()
        };
        let (limiter, clock) = limiter(config);
        let dest = Destination::shared("channel");

        let mut sent_at = Vec::new();
        for _ in 0..10 {
            limiter.acquire(&dest).await;
            sent_at.push(clock.now());
        }

        // Any cap + 1 consecutive sends span at least one full window.
        for i in 0..sent_at.len() - 3 {
            assert!(sent_at[i + 3] - sent_at[i] >= Duration::from_secs(10));
        }
        // The first cap sends did not wait.
        assert_eq!(sent_at[0], sent_at[2]);
    }

    #[tokio::test]
    async fn test_shared_waits_for_oldest_to_leave_window() {
        let config = RateLimitConfig {
            shared_max_sends: 2,
            shared_window_secs: 60,
            ..Default::default()
        };
        let (limiter, clock) = limiter(config);
        let dest = Destination::shared("channel");

        limiter.acquire(&dest).await;
        clock.advance(Duration::from_secs(20));
        limiter.acquire(&dest).await;

        let waited = limiter.acquire(&dest).await;
        assert_eq!(waited, Duration::from_secs(40));
    }

    #[tokio::test]
    async fn test_destinations_are_independent() {
        let (limiter, _clock) = limiter(RateLimitConfig::default());

        limiter.acquire(&Destination::direct("alice")).await;
        let waited = limiter.acquire(&Destination::direct("bob")).await;
        assert_eq!(waited, Duration::ZERO);
        assert_eq!(limiter.tracked_destinations().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_get_distinct_slots() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig::default()));
        let dest = Destination::direct("alice");
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let limiter = limiter.clone();
            let dest = dest.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire(&dest).await;
                Instant::now()
            }));
        }

        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap() - start);
        }
        finished.sort();

        assert!(finished[0] < Duration::from_millis(10));
        assert!(finished[1] >= Duration::from_secs(1));
        assert!(finished[2] >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_entries() {
        let config = RateLimitConfig {
            shared_window_secs: 60,
            ..Default::default()
        };
        let (limiter, clock) = limiter(config);

        limiter.acquire(&Destination::direct("alice")).await;
        limiter.acquire(&Destination::shared("channel")).await;
        assert_eq!(limiter.tracked_destinations().await, 2);

        clock.advance(Duration::from_secs(61));
        assert_eq!(limiter.cleanup().await, 1);
        assert_eq!(limiter.tracked_destinations().await, 1);

        clock.advance(Duration::from_secs(60 * 60));
        assert_eq!(limiter.cleanup().await, 1);
        assert_eq!(limiter.tracked_destinations().await, 0);
    }
}
