//! Exponential backoff with additive jitter

use rand::Rng;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Backoff delay calculator
///
/// The delay for a zero-based attempt index is
/// `min(initial_delay * multiplier^index, max_delay)` plus a random share of
/// up to `jitter` of that value. Jitter never shortens the exponential delay.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: f64,
}

impl ExponentialBackoff {
    /// Create a new backoff calculator
    pub fn new(initial_delay: Duration, max_delay: Duration, multiplier: f64, jitter: f64) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier: multiplier.max(0.0),
            jitter: if jitter.is_finite() {
                jitter.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }

    /// Capped exponential delay in milliseconds, before jitter
    fn base_millis(&self, attempt_index: u32) -> f64 {
        let exponent = i32::try_from(attempt_index).unwrap_or(i32::MAX);
        let delay = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        delay.min(self.max_delay.as_millis() as f64)
    }

    /// Delay for an attempt index without jitter
    pub fn base_delay(&self, attempt_index: u32) -> Duration {
        Duration::from_millis(self.base_millis(attempt_index).round() as u64)
    }

    /// Delay for an attempt index given a jitter sample in `[0, 1)`
    pub fn delay_with_sample(&self, attempt_index: u32, sample: f64) -> Duration {
        let base = self.base_millis(attempt_index);
        let jittered = base + base * self.jitter * sample.clamp(0.0, 1.0);
        Duration::from_millis(jittered.round() as u64)
    }

    /// Delay for an attempt index with a fresh random jitter sample
    pub fn delay(&self, attempt_index: u32) -> Duration {
        let sample: f64 = rand::thread_rng().gen();
        self.delay_with_sample(attempt_index, sample)
    }
}

impl From<&RetryPolicy> for ExponentialBackoff {
    fn from(policy: &RetryPolicy) -> Self {
        Self::new(
            policy.initial_delay,
            policy.max_delay,
            policy.backoff_multiplier,
            policy.jitter,
        )
    }
}
