//! Retry policy and executor

use log::{debug, info, warn};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::backoff::ExponentialBackoff;
use crate::classify::{is_retryable_error, FailureSignals};
use crate::clock::{Clock, TokioClock};

/// Decides whether a failed attempt is retried, given the 1-based attempt number
pub type RetryPredicate<E> = Arc<dyn Fn(&E, u32) -> bool + Send + Sync>;

/// Observes a retry about to happen, with the attempt number and the delay
pub type RetryObserver<E> = Arc<dyn Fn(&E, u32, Duration) + Send + Sync>;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Upper bound for the exponential delay
    pub max_delay: Duration,

    /// Factor applied to the delay after every attempt
    pub backoff_multiplier: f64,

    /// Random share of the delay added on top of it, in `[0, 1]`
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given number of attempts and no delay between them
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Replace the maximum number of attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

impl From<&liftlog_config::RetrySettings> for RetryPolicy {
    fn from(settings: &liftlog_config::RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            initial_delay: settings.initial_delay,
            max_delay: settings.max_delay,
            backoff_multiplier: settings.backoff_multiplier,
            jitter: settings.jitter,
        }
    }
}

/// Options for one retried call
pub struct RetryOptions<E> {
    /// Attempt count and delay shape
    pub policy: RetryPolicy,
    should_retry: RetryPredicate<E>,
    on_retry: Option<RetryObserver<E>>,
}

impl<E: FailureSignals + 'static> RetryOptions<E> {
    /// Options retrying only errors accepted by [`is_retryable_error`]
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_predicate(policy, |error: &E, _attempt| is_retryable_error(error))
    }
}

impl<E: FailureSignals + 'static> Default for RetryOptions<E> {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl<E> RetryOptions<E> {
    /// Options with a custom retry predicate
    pub fn with_predicate<P>(policy: RetryPolicy, should_retry: P) -> Self
    where
        P: Fn(&E, u32) -> bool + Send + Sync + 'static,
    {
        Self {
            policy,
            should_retry: Arc::new(should_retry),
            on_retry: None,
        }
    }

    /// Replace the retry predicate
    pub fn should_retry<P>(mut self, should_retry: P) -> Self
    where
        P: Fn(&E, u32) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(should_retry);
        self
    }

    /// Install an observer called before every retry delay
    pub fn on_retry<O>(mut self, on_retry: O) -> Self
    where
        O: Fn(&E, u32, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(on_retry));
        self
    }

    /// Replace the maximum number of attempts
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = max_attempts;
        self
    }
}

impl<E: 'static> RetryOptions<E> {
    /// Options retrying every failure until attempts run out
    pub fn retry_all(policy: RetryPolicy) -> Self {
        Self::with_predicate(policy, |_: &E, _| true)
    }
}

impl<E> Clone for RetryOptions<E> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            should_retry: Arc::clone(&self.should_retry),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("policy", &self.policy)
            .field("on_retry", &self.on_retry.is_some())
            .finish_non_exhaustive()
    }
}

/// Outcome of a retried call
///
/// `attempts` is the number of invocations actually made.
#[derive(Debug)]
pub struct RetryResult<T, E> {
    pub outcome: Result<T, E>,
    pub attempts: u32,
}

impl<T, E> RetryResult<T, E> {
    /// Whether the last attempt succeeded
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn data(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&E> {
        self.outcome.as_ref().err()
    }

    /// Drop the attempt count
    pub fn into_result(self) -> Result<T, E> {
        self.outcome
    }
}

/// Retry executor
pub struct RetryExecutor<E> {
    options: RetryOptions<E>,
    clock: Arc<dyn Clock>,
}

impl<E> RetryExecutor<E> {
    /// Create a new retry executor sleeping on the Tokio timer
    pub fn new(options: RetryOptions<E>) -> Self {
        Self {
            options,
            clock: Arc::new(TokioClock),
        }
    }

    /// Use another clock for retry delays
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn options(&self) -> &RetryOptions<E> {
        &self.options
    }

    /// Execute a function with retry logic
    ///
    /// Never fails: the last error is returned inside the [`RetryResult`].
    pub async fn execute<F, Fut, T>(&self, mut f: F) -> RetryResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let max_attempts = self.options.policy.max_attempts.max(1);
        let backoff = ExponentialBackoff::from(&self.options.policy);
        let mut attempts = 0;

        let last_error = loop {
            attempts += 1;
            debug!("Executing attempt {} of {}", attempts, max_attempts);

            match f().await {
                Ok(data) => {
                    if attempts > 1 {
                        info!("Operation succeeded after {} attempts", attempts);
                    }
                    return RetryResult {
                        outcome: Ok(data),
                        attempts,
                    };
                }
                Err(error) => {
                    if attempts >= max_attempts {
                        warn!("Operation failed after {} attempts: {}", attempts, error);
                        break error;
                    }

                    if !(self.options.should_retry)(&error, attempts) {
                        debug!("Operation failed with non-retryable error: {}", error);
                        break error;
                    }

                    let delay = backoff.delay(attempts - 1);
                    if let Some(on_retry) = &self.options.on_retry {
                        on_retry(&error, attempts, delay);
                    }

                    warn!(
                        "Attempt {} failed: {}. Retrying in {:?}",
                        attempts, error, delay
                    );
                    self.clock.sleep(delay).await;
                }
            }
        };

        RetryResult {
            outcome: Err(last_error),
            attempts,
        }
    }
}

/// Run `f` with retries using the Tokio clock
pub async fn with_retry<F, Fut, T, E>(f: F, options: RetryOptions<E>) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    RetryExecutor::new(options).execute(f).await
}
