//! Retry plus circuit breaking for a named service
//!
//! Every retry attempt passes back through the service's breaker. Once the
//! breaker opens mid-sequence, the next attempt is rejected with
//! [`ResilienceError::CircuitOpen`], which is never retried, so a sequence
//! never keeps hammering a dependency already known to be down.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerOptions;
use crate::error::ResilienceError;
use crate::manager::CircuitBreakerManager;
use crate::retry::{RetryExecutor, RetryObserver, RetryOptions, RetryPolicy, RetryPredicate};

/// Options for a call made through [`with_resilience`]
pub struct ResilienceOptions<E> {
    /// Breaker registry key
    pub service_name: String,

    /// Attempt count and delay shape
    pub retry: RetryPolicy,

    /// Breaker thresholds and observers, used only if the breaker does not
    /// exist yet
    pub circuit_breaker: Option<CircuitBreakerOptions>,

    should_retry: Option<RetryPredicate<E>>,
    on_retry: Option<RetryObserver<E>>,
}

impl<E> ResilienceOptions<E> {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            retry: RetryPolicy::default(),
            circuit_breaker: None,
            should_retry: None,
            on_retry: None,
        }
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn circuit_breaker(mut self, options: impl Into<CircuitBreakerOptions>) -> Self {
        self.circuit_breaker = Some(options.into());
        self
    }

    /// Restrict which operation errors are retried
    ///
    /// Without a predicate every operation error is retried until attempts
    /// run out.
    pub fn should_retry<P>(mut self, should_retry: P) -> Self
    where
        P: Fn(&E, u32) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(should_retry));
        self
    }

    pub fn on_retry<O>(mut self, on_retry: O) -> Self
    where
        O: Fn(&E, u32, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(on_retry));
        self
    }
}

impl<E: 'static> ResilienceOptions<E> {
    /// Retry options for attempts that go through the breaker
    fn breaker_retry_options(&self) -> RetryOptions<ResilienceError<E>> {
        let should_retry = self.should_retry.clone();
        let mut options = RetryOptions::with_predicate(
            self.retry.clone(),
            move |error: &ResilienceError<E>, attempt| match error {
                ResilienceError::CircuitOpen(_) => false,
                ResilienceError::Operation(inner) => should_retry
                    .as_ref()
                    .map_or(true, |should_retry| should_retry(inner, attempt)),
            },
        );

        if let Some(on_retry) = self.on_retry.clone() {
            options = options.on_retry(move |error: &ResilienceError<E>, attempt, delay| {
                if let ResilienceError::Operation(inner) = error {
                    on_retry(inner, attempt, delay);
                }
            });
        }

        options
    }
}

impl<E> Clone for ResilienceOptions<E> {
    fn clone(&self) -> Self {
        Self {
            service_name: self.service_name.clone(),
            retry: self.retry.clone(),
            circuit_breaker: self.circuit_breaker.clone(),
            should_retry: self.should_retry.clone(),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<E> fmt::Debug for ResilienceOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilienceOptions")
            .field("service_name", &self.service_name)
            .field("retry", &self.retry)
            .field("circuit_breaker", &self.circuit_breaker)
            .field("should_retry", &self.should_retry.is_some())
            .finish_non_exhaustive()
    }
}

/// Run `f` with retries through the breaker registered for the service
///
/// Returns the terminal error of the retry sequence: either the last
/// operation error or the breaker rejection that stopped it.
pub async fn with_resilience<F, Fut, T, E>(
    manager: &CircuitBreakerManager,
    mut f: F,
    options: &ResilienceOptions<E>,
) -> Result<T, ResilienceError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display + 'static,
{
    let breaker = manager.get_breaker(&options.service_name, options.circuit_breaker.as_ref());
    let executor =
        RetryExecutor::new(options.breaker_retry_options()).with_clock(manager.clock());

    let result = executor
        .execute(|| {
            let call = breaker.try_acquire().map(|()| f());
            let breaker = breaker.clone();
            async move {
                let outcome = call?.await;
                breaker.record_outcome(outcome)
            }
        })
        .await;

    if let Err(error) = &result.outcome {
        log::debug!(
            "Call to '{}' failed after {} attempts: {}",
            options.service_name,
            result.attempts,
            error
        );
    }

    result.into_result()
}

/// An operation bound to its resilience options
///
/// Each `call` runs the operation through [`with_resilience`], cloning the
/// arguments for every attempt.
pub struct ResilientClient<F, E> {
    manager: Arc<CircuitBreakerManager>,
    operation: F,
    options: ResilienceOptions<E>,
}

impl<F, E> ResilientClient<F, E> {
    pub fn options(&self) -> &ResilienceOptions<E> {
        &self.options
    }

    pub async fn call<A, Fut, T>(&self, args: A) -> Result<T, ResilienceError<E>>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        A: Clone,
        E: fmt::Display + 'static,
    {
        with_resilience(&self.manager, || (self.operation)(args.clone()), &self.options).await
    }
}

/// Wrap `operation` so every call goes through [`with_resilience`]
pub fn create_resilient_client<F, E>(
    manager: Arc<CircuitBreakerManager>,
    operation: F,
    options: ResilienceOptions<E>,
) -> ResilientClient<F, E> {
    ResilientClient {
        manager,
        operation,
        options,
    }
}

/// Shared breaker registry plus configured retry policies
///
/// Built once at the application's composition root and handed to the data
/// access layer.
#[derive(Clone)]
pub struct Resilience {
    manager: Arc<CircuitBreakerManager>,
    retry_defaults: RetryPolicy,
    retry_overrides: HashMap<String, RetryPolicy>,
}

impl Resilience {
    pub fn new(manager: Arc<CircuitBreakerManager>) -> Self {
        Self {
            manager,
            retry_defaults: RetryPolicy::default(),
            retry_overrides: HashMap::new(),
        }
    }

    /// Build registry and retry policies from the `resilience` config domain
    pub fn from_config(
        config: &liftlog_config::ResilienceConfig,
        clock: Arc<dyn crate::clock::Clock>,
    ) -> Self {
        let retry_overrides = config
            .services
            .iter()
            .filter_map(|(name, overrides)| {
                overrides
                    .retry
                    .as_ref()
                    .map(|settings| (name.clone(), RetryPolicy::from(settings)))
            })
            .collect();

        Self {
            manager: Arc::new(CircuitBreakerManager::from_config(config, clock)),
            retry_defaults: RetryPolicy::from(&config.retry),
            retry_overrides,
        }
    }

    pub fn manager(&self) -> &Arc<CircuitBreakerManager> {
        &self.manager
    }

    /// Configured retry policy for a service
    pub fn retry_policy(&self, service: &str) -> RetryPolicy {
        self.retry_overrides
            .get(service)
            .unwrap_or(&self.retry_defaults)
            .clone()
    }

    /// Options for a service carrying its configured retry policy
    pub fn options<E>(&self, service: &str) -> ResilienceOptions<E> {
        ResilienceOptions::new(service).retry(self.retry_policy(service))
    }

    pub async fn execute<F, Fut, T, E>(
        &self,
        f: F,
        options: &ResilienceOptions<E>,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display + 'static,
    {
        with_resilience(&self.manager, f, options).await
    }

    pub fn client<F, E>(
        &self,
        operation: F,
        options: ResilienceOptions<E>,
    ) -> ResilientClient<F, E> {
        create_resilient_client(Arc::clone(&self.manager), operation, options)
    }
}
