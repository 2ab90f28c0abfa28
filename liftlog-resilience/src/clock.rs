//! Time source for retry delays and circuit breaker cooldowns
//!
//! Every sleep and every timestamp taken by this crate goes through a
//! [`Clock`], so tests can drive retries and cooldowns without real waiting.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of the current instant and of suspension between retries
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by `tokio::time`
///
/// Honors paused time in `#[tokio::test(start_paused = true)]` tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Manually driven clock for tests
///
/// `sleep` returns immediately after advancing the clock by the requested
/// duration and recording it, so a retry sequence completes instantly while
/// its delays stay observable.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualClockState>>,
}

#[derive(Debug)]
struct ManualClockState {
    origin: Instant,
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualClockState {
                origin: Instant::now(),
                elapsed: Duration::ZERO,
                sleeps: Vec::new(),
            })),
        }
    }

    /// Move the clock forward without recording a sleep
    pub fn advance(&self, duration: Duration) {
        self.inner.lock().elapsed += duration;
    }

    /// Total time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        self.inner.lock().elapsed
    }

    /// Every duration passed to [`Clock::sleep`], in call order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.lock().sleeps.clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let state = self.inner.lock();
        state.origin + state.elapsed
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.inner.lock();
        state.sleeps.push(duration);
        state.elapsed += duration;
    }
}
