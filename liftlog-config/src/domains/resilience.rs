//! Retry and circuit breaker configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_range, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Resilience configuration for outbound calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Retry policy applied when a service has no override
    pub retry: RetrySettings,

    /// Breaker thresholds applied when a service has no override
    pub circuit_breaker: CircuitBreakerSettings,

    /// Per-service overrides keyed by service name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub services: BTreeMap<String, ServiceOverrides>,
}

/// Retry policy settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds
    #[serde(with = "crate::domains::utils::serde_duration_ms")]
    pub initial_delay: Duration,

    /// Upper bound for the exponential delay, in milliseconds
    #[serde(with = "crate::domains::utils::serde_duration_ms")]
    pub max_delay: Duration,

    pub backoff_multiplier: f64,

    /// Fraction of the delay added as random jitter
    pub jitter: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

/// Circuit breaker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,

    /// Consecutive half-open successes that close it again
    pub success_threshold: u32,

    /// Cooldown before a probe is allowed, in milliseconds
    #[serde(with = "crate::domains::utils::serde_duration_ms")]
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_millis(60_000),
        }
    }
}

/// Settings replacing the defaults for one service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetrySettings>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerSettings>,
}

impl Validatable for ResilienceConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.retry.validate()?;
        self.circuit_breaker.validate()?;

        for (name, overrides) in &self.services {
            validate_required_string(name.trim(), "service name", self.domain_name())?;
            if let Some(retry) = &overrides.retry {
                retry.validate()?;
            }
            if let Some(circuit_breaker) = &overrides.circuit_breaker {
                circuit_breaker.validate()?;
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "resilience"
    }
}

impl Validatable for RetrySettings {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.max_attempts, "max_attempts", self.domain_name())?;
        validate_range(self.jitter, 0.0, 1.0, "jitter", self.domain_name())?;

        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err(self.validation_error(format!(
                "backoff_multiplier must be at least 1, got {}",
                self.backoff_multiplier
            )));
        }

        if self.initial_delay > self.max_delay {
            return Err(self.validation_error(format!(
                "initial_delay ({}ms) cannot exceed max_delay ({}ms)",
                self.initial_delay.as_millis(),
                self.max_delay.as_millis()
            )));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "resilience.retry"
    }
}

impl Validatable for CircuitBreakerSettings {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.failure_threshold, "failure_threshold", self.domain_name())?;
        validate_positive(self.success_threshold, "success_threshold", self.domain_name())?;

        if self.reset_timeout.is_zero() {
            return Err(self.validation_error("reset_timeout must be greater than 0"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "resilience.circuit_breaker"
    }
}
