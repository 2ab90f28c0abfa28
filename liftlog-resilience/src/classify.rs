//! Retry eligibility of collaborator errors
//!
//! Errors are classified from three abstract signals: a string code in the
//! style of the document store and auth provider (`unavailable`,
//! `auth/network-request-failed`, ...), an HTTP-style status and the display
//! message. Anything not explicitly recognised as transient is not retried.

use crate::error::{CircuitBreakerOpenError, ResilienceError};
use std::fmt;
use std::io;

/// Code reported by [`CircuitBreakerOpenError`]
pub const CIRCUIT_OPEN_CODE: &str = "circuit-open";

const AUTH_CODE_PREFIX: &str = "auth/";
const AUTH_NETWORK_FAILURE: &str = "auth/network-request-failed";

const NON_RETRYABLE_CODES: &[&str] = &["permission-denied", "unauthenticated", CIRCUIT_OPEN_CODE];

const RETRYABLE_CODES: &[&str] = &[
    "unavailable",
    "deadline-exceeded",
    "aborted",
    "resource-exhausted",
    "network-error",
    "network-request-failed",
];

const RETRYABLE_MESSAGE_HINTS: &[&str] = &["network", "connection", "timeout"];

/// Signals an error exposes for retry classification
pub trait FailureSignals: fmt::Display {
    /// Machine readable error code, e.g. `unavailable` or `auth/user-not-found`
    fn code(&self) -> Option<&str> {
        None
    }

    /// HTTP-style status code
    fn status(&self) -> Option<u16> {
        None
    }
}

/// Default retry predicate
///
/// Retryable: connectivity and availability codes, rate limiting (429 or
/// `resource-exhausted`), any 5xx status and messages mentioning the
/// network, a connection or a timeout. Authentication errors other than the
/// auth network failure, permission errors and other 4xx statuses are never
/// retried.
pub fn is_retryable_error<E: FailureSignals + ?Sized>(error: &E) -> bool {
    if let Some(code) = error.code() {
        let code = code.to_ascii_lowercase();
        if code.starts_with(AUTH_CODE_PREFIX) {
            return code == AUTH_NETWORK_FAILURE;
        }

        // Store codes may carry a product prefix such as `firestore/`
        let short = code.rsplit('/').next().unwrap_or(code.as_str());
        if NON_RETRYABLE_CODES.contains(&short) {
            return false;
        }
        if RETRYABLE_CODES.contains(&short) {
            return true;
        }
    }

    if let Some(status) = error.status() {
        if status == 429 || (500..600).contains(&status) {
            return true;
        }
        if (400..500).contains(&status) {
            return false;
        }
    }

    let message = error.to_string().to_lowercase();
    RETRYABLE_MESSAGE_HINTS
        .iter()
        .any(|hint| message.contains(hint))
}

impl FailureSignals for CircuitBreakerOpenError {
    fn code(&self) -> Option<&str> {
        Some(CIRCUIT_OPEN_CODE)
    }
}

impl<E: FailureSignals> FailureSignals for ResilienceError<E> {
    fn code(&self) -> Option<&str> {
        match self {
            ResilienceError::CircuitOpen(error) => error.code(),
            ResilienceError::Operation(error) => error.code(),
        }
    }

    fn status(&self) -> Option<u16> {
        match self {
            ResilienceError::CircuitOpen(_) => None,
            ResilienceError::Operation(error) => error.status(),
        }
    }
}

impl FailureSignals for io::Error {
    fn code(&self) -> Option<&str> {
        match self.kind() {
            io::ErrorKind::TimedOut => Some("deadline-exceeded"),
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe => Some("unavailable"),
            io::ErrorKind::Interrupted => Some("aborted"),
            io::ErrorKind::PermissionDenied => Some("permission-denied"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug)]
    struct Signal {
        code: Option<&'static str>,
        status: Option<u16>,
        message: &'static str,
    }

    impl fmt::Display for Signal {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    impl FailureSignals for Signal {
        fn code(&self) -> Option<&str> {
            self.code
        }

        fn status(&self) -> Option<u16> {
            self.status
        }
    }

    fn code(code: &'static str) -> Signal {
        Signal {
            code: Some(code),
            status: None,
            message: "failed",
        }
    }

    fn status(status: u16) -> Signal {
        Signal {
            code: None,
            status: Some(status),
            message: "failed",
        }
    }

    fn message(message: &'static str) -> Signal {
        Signal {
            code: None,
            status: None,
            message,
        }
    }

    #[test]
    fn test_transient_codes_are_retryable() {
        for c in ["unavailable", "deadline-exceeded", "aborted", "resource-exhausted"] {
            assert!(is_retryable_error(&code(c)), "{} should be retryable", c);
        }
        assert!(is_retryable_error(&code("firestore/unavailable")));
        assert!(is_retryable_error(&code("UNAVAILABLE")));
    }

    #[test]
    fn test_auth_errors_only_retry_network_failures() {
        assert!(is_retryable_error(&code("auth/network-request-failed")));
        assert!(!is_retryable_error(&code("auth/user-not-found")));
        assert!(!is_retryable_error(&code("auth/too-many-requests")));
    }

    #[test]
    fn test_permission_denied_is_not_retryable() {
        let error = Signal {
            code: Some("permission-denied"),
            status: Some(503),
            message: "network policy rejected",
        };
        assert!(!is_retryable_error(&error));
    }

    #[test]
    fn test_status_classification() {
        assert!(is_retryable_error(&status(500)));
        assert!(is_retryable_error(&status(503)));
        assert!(is_retryable_error(&status(429)));
        assert!(!is_retryable_error(&status(400)));
        assert!(!is_retryable_error(&status(404)));
        assert!(!is_retryable_error(&status(499)));
    }

    #[test]
    fn test_message_hints() {
        assert!(is_retryable_error(&message("Network request failed")));
        assert!(is_retryable_error(&message("connection reset by peer")));
        assert!(is_retryable_error(&message("Request TIMEOUT")));
        assert!(!is_retryable_error(&message("document has invalid field")));
    }

    #[test]
    fn test_client_status_wins_over_message() {
        let error = Signal {
            code: None,
            status: Some(403),
            message: "connection not allowed",
        };
        assert!(!is_retryable_error(&error));
    }

    #[test]
    fn test_unknown_errors_are_not_retryable() {
        assert!(!is_retryable_error(&message("something odd happened")));
        assert!(!is_retryable_error(&code("not-found")));
    }

    #[test]
    fn test_circuit_open_is_never_retryable() {
        let error: ResilienceError<Signal> = CircuitBreakerOpenError {
            service: "network-timeouts".to_string(),
            retry_after: Duration::from_secs(1),
        }
        .into();
        assert!(!is_retryable_error(&error));

        let wrapped = ResilienceError::Operation(code("unavailable"));
        assert!(is_retryable_error(&wrapped));
    }

    #[test]
    fn test_io_errors() {
        assert!(is_retryable_error(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(is_retryable_error(&io::Error::from(
            io::ErrorKind::ConnectionRefused
        )));
        assert!(!is_retryable_error(&io::Error::from(
            io::ErrorKind::PermissionDenied
        )));
        assert!(!is_retryable_error(&io::Error::new(
            io::ErrorKind::InvalidData,
            "bad payload"
        )));
    }
}
