//! Circuit breaker pattern implementation
//!
//! A breaker guards one logical service. It opens after `failure_threshold`
//! consecutive failures, rejects calls until `reset_timeout` has passed since
//! the last failure, then lets calls through as probes in the half-open
//! state. The move to half-open happens lazily when the next call arrives;
//! nothing runs in the background. A single failed probe reopens the circuit.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{Clock, TokioClock};
use crate::error::{CircuitBreakerOpenError, ResilienceError};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Circuit is closed, requests pass through normally
    Closed,
    /// Circuit is open, requests are blocked
    Open,
    /// Circuit is half-open, requests probe whether the service recovered
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Number of successes in half-open state before closing
    pub success_threshold: u32,

    /// Cooldown after the last failure before a probe is allowed
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&liftlog_config::CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &liftlog_config::CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            success_threshold: settings.success_threshold,
            reset_timeout: settings.reset_timeout,
        }
    }
}

/// Observer called with the service name on a state transition
pub type TransitionHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Observers for breaker transitions
///
/// Hooks run after the breaker's lock is released and must not panic.
#[derive(Clone, Default)]
pub struct TransitionHooks {
    pub on_open: Option<TransitionHook>,
    pub on_close: Option<TransitionHook>,
    pub on_half_open: Option<TransitionHook>,
}

impl fmt::Debug for TransitionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionHooks")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_half_open", &self.on_half_open.is_some())
            .finish()
    }
}

/// Thresholds plus observers, as supplied when a breaker is first requested
#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerOptions {
    pub config: CircuitBreakerConfig,
    pub hooks: TransitionHooks,
}

impl From<CircuitBreakerConfig> for CircuitBreakerOptions {
    fn from(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            hooks: TransitionHooks::default(),
        }
    }
}

/// Point-in-time view of a breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerStats {
    pub service: String,
    pub state: CircuitState,
    /// Consecutive failures
    pub failures: u32,
    /// Consecutive successes while half-open
    pub successes: u32,
    #[serde(skip)]
    pub last_failure_time: Option<Instant>,
    #[serde(skip)]
    pub last_success_time: Option<Instant>,
    pub total_requests: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejected: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Opened,
    Closed,
    HalfOpened,
}

#[derive(Debug)]
struct CircuitBreakerState {
    state: CircuitState,
    failures: u32,
    successes: u32,
    last_failure_time: Option<Instant>,
    last_success_time: Option<Instant>,
    total_requests: u64,
    total_successes: u64,
    total_failures: u64,
    total_rejected: u64,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            last_failure_time: None,
            last_success_time: None,
            total_requests: 0,
            total_successes: 0,
            total_failures: 0,
            total_rejected: 0,
        }
    }
}

/// Thread-safe circuit breaker for a single service
///
/// Clones share state, so every handle obtained for the same service observes
/// the same counters.
#[derive(Clone)]
pub struct CircuitBreaker {
    service: Arc<str>,
    config: Arc<CircuitBreakerConfig>,
    hooks: Arc<TransitionHooks>,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<CircuitBreakerState>>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("service", &self.service)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    pub fn new(service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_options(service, config.into(), Arc::new(TokioClock))
    }

    /// Create with thresholds, observers and clock
    pub fn with_options(
        service: impl Into<String>,
        options: CircuitBreakerOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            service: Arc::from(service.into()),
            config: Arc::new(options.config),
            hooks: Arc::new(options.hooks),
            clock,
            state: Arc::new(Mutex::new(CircuitBreakerState::default())),
        }
    }

    /// Start building a breaker for a service
    pub fn builder(service: impl Into<String>) -> CircuitBreakerBuilder {
        CircuitBreakerBuilder::new(service)
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current state
    ///
    /// An open breaker whose cooldown has elapsed still reports `Open` until
    /// the next call attempt.
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    /// Whether both handles refer to the same breaker
    pub fn ptr_eq(&self, other: &CircuitBreaker) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Get a snapshot of counters and timestamps
    pub fn stats(&self) -> CircuitBreakerStats {
        let state = self.state.lock();
        CircuitBreakerStats {
            service: self.service.to_string(),
            state: state.state,
            failures: state.failures,
            successes: state.successes,
            last_failure_time: state.last_failure_time,
            last_success_time: state.last_success_time,
            total_requests: state.total_requests,
            total_successes: state.total_successes,
            total_failures: state.total_failures,
            total_rejected: state.total_rejected,
        }
    }

    /// Run `f` through the breaker
    ///
    /// Fails with [`ResilienceError::CircuitOpen`] without invoking `f` while
    /// the circuit is open and cooling down.
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.try_acquire()?;
        let outcome = f().await;
        self.record_outcome(outcome)
    }

    /// Admit or reject a call attempt
    ///
    /// Moves an open breaker whose cooldown has elapsed to half-open.
    pub fn try_acquire(&self) -> Result<(), CircuitBreakerOpenError> {
        let transition = {
            let mut state = self.state.lock();
            if state.state != CircuitState::Open {
                return Ok(());
            }

            let elapsed = state
                .last_failure_time
                .map(|at| self.clock.now().saturating_duration_since(at))
                .unwrap_or(self.config.reset_timeout);

            if elapsed < self.config.reset_timeout {
                state.total_rejected += 1;
                return Err(CircuitBreakerOpenError {
                    service: self.service.to_string(),
                    retry_after: self.config.reset_timeout - elapsed,
                });
            }

            state.state = CircuitState::HalfOpen;
            state.successes = 0;
            Transition::HalfOpened
        };

        self.notify(transition);
        Ok(())
    }

    /// Record the outcome of an admitted call and pass it through
    pub fn record_outcome<T, E>(&self, outcome: Result<T, E>) -> Result<T, ResilienceError<E>> {
        match outcome {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure();
                Err(ResilienceError::Operation(error))
            }
        }
    }

    /// Record a successful operation
    pub fn record_success(&self) {
        let transition = {
            let mut state = self.state.lock();
            state.total_requests += 1;
            state.total_successes += 1;
            state.last_success_time = Some(self.clock.now());

            let current = state.state;
            match current {
                CircuitState::Closed => {
                    state.failures = 0;
                    state.successes = 0;
                    None
                }
                CircuitState::HalfOpen => {
                    state.successes += 1;
                    if state.successes >= self.config.success_threshold {
                        state.state = CircuitState::Closed;
                        state.failures = 0;
                        state.successes = 0;
                        Some(Transition::Closed)
                    } else {
                        None
                    }
                }
                // A call admitted before another caller opened the circuit
                CircuitState::Open => None,
            }
        };

        if let Some(transition) = transition {
            self.notify(transition);
        }
    }

    /// Record a failed operation
    pub fn record_failure(&self) {
        let transition = {
            let mut state = self.state.lock();
            state.total_requests += 1;
            state.total_failures += 1;
            state.failures = state.failures.saturating_add(1);
            state.last_failure_time = Some(self.clock.now());

            let current = state.state;
            match current {
                CircuitState::Closed if state.failures >= self.config.failure_threshold => {
                    state.state = CircuitState::Open;
                    Some(Transition::Opened)
                }
                CircuitState::Closed => None,
                CircuitState::HalfOpen => {
                    state.state = CircuitState::Open;
                    state.successes = 0;
                    Some(Transition::Opened)
                }
                CircuitState::Open => None,
            }
        };

        if let Some(transition) = transition {
            self.notify(transition);
        }
    }

    /// Reset the circuit breaker to closed state, clearing counters and timestamps
    pub fn reset(&self) {
        *self.state.lock() = CircuitBreakerState::default();
        log::info!("Circuit breaker for '{}' reset", self.service);
    }

    /// Force the circuit open as if a failure just happened
    pub fn open(&self) {
        {
            let mut state = self.state.lock();
            state.state = CircuitState::Open;
            state.successes = 0;
            state.last_failure_time = Some(self.clock.now());
        }
        self.notify(Transition::Opened);
    }

    fn notify(&self, transition: Transition) {
        let hook = match transition {
            Transition::Opened => {
                log::warn!(
                    "Circuit breaker for '{}' opened, rejecting calls for {:?}",
                    self.service,
                    self.config.reset_timeout
                );
                &self.hooks.on_open
            }
            Transition::Closed => {
                log::info!(
                    "Circuit breaker for '{}' closed after successful recovery",
                    self.service
                );
                &self.hooks.on_close
            }
            Transition::HalfOpened => {
                log::info!(
                    "Circuit breaker for '{}' transitioned to half-open state",
                    self.service
                );
                &self.hooks.on_half_open
            }
        };

        if let Some(hook) = hook {
            hook(&self.service);
        }
    }
}

/// Builder for circuit breakers
pub struct CircuitBreakerBuilder {
    service: String,
    options: CircuitBreakerOptions,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerBuilder {
    /// Create a new builder with default config
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            options: CircuitBreakerOptions::default(),
            clock: Arc::new(TokioClock),
        }
    }

    /// Set failure threshold
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.options.config.failure_threshold = threshold;
        self
    }

    /// Set success threshold for recovery
    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.options.config.success_threshold = threshold;
        self
    }

    /// Set cooldown before attempting recovery
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.options.config.reset_timeout = timeout;
        self
    }

    pub fn on_open(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.options.hooks.on_open = Some(Arc::new(hook));
        self
    }

    pub fn on_close(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.options.hooks.on_close = Some(Arc::new(hook));
        self
    }

    pub fn on_half_open(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.options.hooks.on_half_open = Some(Arc::new(hook));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the circuit breaker
    pub fn build(self) -> CircuitBreaker {
        CircuitBreaker::with_options(self.service, self.options, self.clock)
    }
}
