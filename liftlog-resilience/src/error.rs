//! Error types surfaced by the resilience layer

use std::time::Duration;
use thiserror::Error;

/// Raised instead of invoking an operation while its breaker is open
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Circuit breaker for '{service}' is open, retry in {retry_after:?}")]
pub struct CircuitBreakerOpenError {
    /// Service whose breaker rejected the call
    pub service: String,

    /// Time left until the breaker lets a probe through
    pub retry_after: Duration,
}

/// Failure of a call made through a circuit breaker
///
/// Operation errors pass through untouched; the layer never wraps or
/// reinterprets what the collaborator raised.
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    /// The breaker was open, the operation was not invoked
    #[error(transparent)]
    CircuitOpen(#[from] CircuitBreakerOpenError),

    /// The operation itself failed
    #[error("{0}")]
    Operation(E),
}

impl<E> ResilienceError<E> {
    /// Get the operation error if the operation ran
    pub fn into_inner(self) -> Option<E> {
        match self {
            ResilienceError::Operation(error) => Some(error),
            ResilienceError::CircuitOpen(_) => None,
        }
    }

    /// Borrow the operation error if the operation ran
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            ResilienceError::Operation(error) => Some(error),
            ResilienceError::CircuitOpen(_) => None,
        }
    }

    /// Check if this represents a circuit breaker open error
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen(_))
    }
}
