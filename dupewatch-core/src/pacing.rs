//! Request pacing and time sources for acquisition sessions.
//!
//! Both are traits so tests can replace the randomized delay and the wall
//! clock with deterministic stand-ins.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Default lower bound of the inter-page delay.
pub const DEFAULT_DELAY_MIN: Duration = Duration::from_secs(1);

/// Default upper bound of the inter-page delay.
pub const DEFAULT_DELAY_MAX: Duration = Duration::from_secs(3);

/// Waits between two page requests of a session.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Wait before requesting `next_page` (zero-based).
    async fn pause(&self, next_page: u32);
}

/// Sleeps for a delay drawn uniformly from `[min, max]`.
pub struct RandomDelayPacer {
    min: Duration,
    max: Duration,
    rng: Mutex<StdRng>,
}

impl RandomDelayPacer {
    /// Pacer seeded from the operating system.
    pub fn new(min: Duration, max: Duration) -> Self {
        Self::with_rng(min, max, StdRng::from_os_rng())
    }

    /// Pacer with a fixed seed; the delay sequence is reproducible.
    pub fn seeded(min: Duration, max: Duration, seed: u64) -> Self {
        Self::with_rng(min, max, StdRng::seed_from_u64(seed))
    }

    fn with_rng(min: Duration, max: Duration, rng: StdRng) -> Self {
        // A reversed range is read as the same interval.
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            rng: Mutex::new(rng),
        }
    }

    /// Draw the next delay.
    pub fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let secs = rng.random_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

impl Default for RandomDelayPacer {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY_MIN, DEFAULT_DELAY_MAX)
    }
}

#[async_trait]
impl Pacer for RandomDelayPacer {
    async fn pause(&self, next_page: u32) {
        let delay = self.next_delay();
        debug!(
            next_page = next_page + 1,
            delay_ms = delay.as_millis() as u64,
            "Pacing before next page"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Never waits. For synthetic sources and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl Pacer for NoDelay {
    async fn pause(&self, _next_page: u32) {}
}

/// Source of `scraped_at` timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_within_bounds() {
        let pacer = RandomDelayPacer::new(Duration::from_millis(100), Duration::from_millis(300));
        for _ in 0..200 {
            let delay = pacer.next_delay();
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(300));
        }
    }

    #[test]
    fn test_seeded_delays_are_reproducible() {
        let a = RandomDelayPacer::seeded(DEFAULT_DELAY_MIN, DEFAULT_DELAY_MAX, 7);
        let b = RandomDelayPacer::seeded(DEFAULT_DELAY_MIN, DEFAULT_DELAY_MAX, 7);
        let left: Vec<_> = (0..5).map(|_| a.next_delay()).collect();
        let right: Vec<_> = (0..5).map(|_| b.next_delay()).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn test_equal_bounds_and_reversed_range() {
        let fixed = RandomDelayPacer::new(Duration::from_millis(5), Duration::from_millis(5));
        assert_eq!(fixed.next_delay(), Duration::from_millis(5));

        let reversed = RandomDelayPacer::new(Duration::from_millis(50), Duration::from_millis(10));
        let delay = reversed.next_delay();
        assert!(delay >= Duration::from_millis(10) && delay <= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_no_delay_returns_immediately() {
        let start = std::time::Instant::now();
        NoDelay.pause(3).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
