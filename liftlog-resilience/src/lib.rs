//! Resilience patterns for Liftlog
//!
//! This crate wraps outbound calls to the document store with retry
//! policies and per-service circuit breakers.

pub mod backoff;
pub mod circuit_breaker;
pub mod classify;
pub mod clock;
pub mod document_store;
pub mod error;
pub mod manager;
pub mod resilient;
pub mod retry;

// Re-export commonly used types
pub use backoff::ExponentialBackoff;
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerBuilder, CircuitBreakerConfig, CircuitBreakerOptions,
    CircuitBreakerStats, CircuitState, TransitionHook, TransitionHooks,
};
pub use classify::{is_retryable_error, FailureSignals};
pub use clock::{Clock, ManualClock, TokioClock};
pub use document_store::{should_retry_document_call, Collection, DocumentStoreError};
pub use error::{CircuitBreakerOpenError, ResilienceError};
pub use manager::{default_manager, CircuitBreakerManager};
pub use resilient::{
    create_resilient_client, with_resilience, Resilience, ResilienceOptions, ResilientClient,
};
pub use retry::{
    with_retry, RetryExecutor, RetryObserver, RetryOptions, RetryPolicy, RetryPredicate,
    RetryResult,
};
