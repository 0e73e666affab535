//! Time source used by the rate limiter and progress reporter.
//!
//! Production code uses [`TokioClock`]. Tests inject
//! [`ManualClock`](crate::testing::ManualClock) so that cadence can be
//! asserted without real waiting.

use async_trait::async_trait;
use tokio::time::{Duration, Instant};

/// A source of monotonic time that can also suspend the caller.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);

    /// Suspend the caller until `deadline`. Returns immediately if it already passed.
    async fn sleep_until(&self, deadline: Instant) {
        let now = self.now();
        if deadline > now {
            self.sleep(deadline - now).await;
        }
    }
}

/// Clock backed by the tokio timer.
///
/// Honors `tokio::time::pause`, so `#[tokio::test(start_paused = true)]`
/// tests get auto-advancing time for free.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
