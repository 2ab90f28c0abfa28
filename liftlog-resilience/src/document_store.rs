//! Service names and retry rules for the hosted document store
//!
//! The data access layer calls the store through [`with_resilience`] with
//! one breaker per collection. Permission and validation failures are never
//! retried: repeating a rejected write cannot succeed.
//!
//! [`with_resilience`]: crate::resilient::with_resilience

use std::fmt;
use thiserror::Error;

use crate::classify::FailureSignals;
use crate::resilient::ResilienceOptions;

const VALIDATION_CODES: &[&str] = &[
    "invalid-argument",
    "failed-precondition",
    "out-of-range",
    "already-exists",
];

const PERMISSION_CODES: &[&str] = &["permission-denied", "unauthenticated"];

/// Collections the product reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Workouts,
    Goals,
    Schedules,
    WeightEntries,
    UserProfiles,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Workouts,
        Collection::Goals,
        Collection::Schedules,
        Collection::WeightEntries,
        Collection::UserProfiles,
    ];

    /// Breaker registry key for calls against this collection
    pub fn service_name(&self) -> &'static str {
        match self {
            Collection::Workouts => "workouts",
            Collection::Goals => "goals",
            Collection::Schedules => "schedules",
            Collection::WeightEntries => "weight-entries",
            Collection::UserProfiles => "user-profiles",
        }
    }

    /// Options used by the data access layer for this collection
    pub fn resilience_options(&self) -> ResilienceOptions<DocumentStoreError> {
        ResilienceOptions::new(self.service_name()).should_retry(should_retry_document_call)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_name())
    }
}

/// Error raised by the document store client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct DocumentStoreError {
    pub code: String,
    pub status: Option<u16>,
    pub message: String,
}

impl DocumentStoreError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new("unavailable", message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new("permission-denied", message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new("invalid-argument", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not-found", message)
    }

    pub fn is_permission_error(&self) -> bool {
        PERMISSION_CODES.contains(&self.code.as_str()) || matches!(self.status, Some(401 | 403))
    }

    /// Input the store rejected as malformed or conflicting
    pub fn is_validation_error(&self) -> bool {
        VALIDATION_CODES.contains(&self.code.as_str()) || matches!(self.status, Some(400 | 422))
    }
}

impl FailureSignals for DocumentStoreError {
    fn code(&self) -> Option<&str> {
        Some(&self.code)
    }

    fn status(&self) -> Option<u16> {
        self.status
    }
}

/// Retry predicate for document store calls
pub fn should_retry_document_call(error: &DocumentStoreError, _attempt: u32) -> bool {
    !error.is_permission_error() && !error.is_validation_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::manager::CircuitBreakerManager;
    use crate::resilient::with_resilience;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_service_names_are_distinct() {
        let names: HashSet<_> = Collection::ALL.iter().map(|c| c.service_name()).collect();
        assert_eq!(names.len(), Collection::ALL.len());
        assert_eq!(Collection::WeightEntries.to_string(), "weight-entries");
    }

    #[test]
    fn test_predicate_refuses_permission_and_validation() {
        assert!(!should_retry_document_call(&DocumentStoreError::permission_denied("rules"), 1));
        assert!(!should_retry_document_call(&DocumentStoreError::invalid_argument("reps < 0"), 1));
        assert!(!should_retry_document_call(
            &DocumentStoreError::new("unknown", "forbidden").with_status(403),
            1
        ));
        assert!(should_retry_document_call(&DocumentStoreError::unavailable("backend"), 1));
        assert!(should_retry_document_call(&DocumentStoreError::not_found("goal"), 1));
    }

    #[test]
    fn test_error_display() {
        let error = DocumentStoreError::unavailable("backend restarting");
        assert_eq!(error.to_string(), "unavailable: backend restarting");
    }

    #[tokio::test]
    async fn test_validation_failure_is_attempted_once() {
        let manager = CircuitBreakerManager::with_clock(Arc::new(ManualClock::new()));
        let calls = AtomicU32::new(0);
        let options = Collection::Workouts.resilience_options();

        let error = with_resilience(
            &manager,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(DocumentStoreError::invalid_argument("duration must be positive"))
            },
            &options,
        )
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            error.into_inner().map(|e| e.code),
            Some("invalid-argument".to_string())
        );
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let manager = CircuitBreakerManager::with_clock(Arc::new(ManualClock::new()));
        let calls = AtomicU32::new(0);
        let options = Collection::Goals.resilience_options();

        let goal = with_resilience(
            &manager,
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(DocumentStoreError::unavailable("backend restarting"))
                } else {
                    Ok("run 5k")
                }
            },
            &options,
        )
        .await
        .unwrap();

        assert_eq!(goal, "run 5k");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
