//! Registry of circuit breakers keyed by service name

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerOptions, CircuitBreakerStats,
};
use crate::clock::{Clock, TokioClock};

static DEFAULT_MANAGER: Lazy<Arc<CircuitBreakerManager>> =
    Lazy::new(|| Arc::new(CircuitBreakerManager::new()));

/// Process-wide registry for composition roots that do not build their own
pub fn default_manager() -> Arc<CircuitBreakerManager> {
    Arc::clone(&DEFAULT_MANAGER)
}

/// Lazily creates one breaker per service name and hands out shared handles
///
/// The options given on the first request for a name win; later requests
/// for the same name get the existing breaker unchanged.
pub struct CircuitBreakerManager {
    clock: Arc<dyn Clock>,
    defaults: CircuitBreakerConfig,
    service_configs: HashMap<String, CircuitBreakerConfig>,
    breakers: RwLock<HashMap<String, CircuitBreaker>>,
}

impl CircuitBreakerManager {
    /// Create an empty registry on the Tokio clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(TokioClock))
    }

    /// Create an empty registry whose breakers use `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            defaults: CircuitBreakerConfig::default(),
            service_configs: HashMap::new(),
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry whose fallback thresholds come from configuration
    pub fn from_config(config: &liftlog_config::ResilienceConfig, clock: Arc<dyn Clock>) -> Self {
        let service_configs = config
            .services
            .iter()
            .filter_map(|(name, overrides)| {
                overrides
                    .circuit_breaker
                    .as_ref()
                    .map(|settings| (name.clone(), CircuitBreakerConfig::from(settings)))
            })
            .collect();

        Self {
            clock,
            defaults: CircuitBreakerConfig::from(&config.circuit_breaker),
            service_configs,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Get the breaker for `service`, creating it on first use
    ///
    /// Without explicit options a new breaker takes the configured thresholds
    /// for that service, or the registry defaults.
    pub fn get_breaker(
        &self,
        service: &str,
        options: Option<&CircuitBreakerOptions>,
    ) -> CircuitBreaker {
        if let Some(breaker) = self.breakers.read().get(service) {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write();
        breakers
            .entry(service.to_string())
            .or_insert_with(|| {
                let options = options
                    .cloned()
                    .unwrap_or_else(|| self.configured_options(service));
                log::debug!(
                    "Creating circuit breaker for '{}' with {:?}",
                    service,
                    options.config
                );
                CircuitBreaker::with_options(service, options, self.clock())
            })
            .clone()
    }

    fn configured_options(&self, service: &str) -> CircuitBreakerOptions {
        self.service_configs
            .get(service)
            .unwrap_or(&self.defaults)
            .clone()
            .into()
    }

    /// Reset every registered breaker to closed
    pub fn reset_all(&self) {
        for breaker in self.breakers.read().values() {
            breaker.reset();
        }
    }

    /// Snapshot of every registered breaker, ordered by service name
    pub fn all_stats(&self) -> BTreeMap<String, CircuitBreakerStats> {
        self.breakers
            .read()
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.stats()))
            .collect()
    }

    /// Number of registered breakers
    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }
}

impl Default for CircuitBreakerManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitState;
    use crate::clock::ManualClock;
    use std::time::Duration;

    #[test]
    fn test_same_name_returns_same_breaker() {
        let manager = CircuitBreakerManager::new();

        let first = manager.get_breaker("workouts", None);
        let second = manager.get_breaker("workouts", None);
        let other = manager.get_breaker("goals", None);

        assert!(first.ptr_eq(&second));
        assert!(!first.ptr_eq(&other));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_first_options_win() {
        let manager = CircuitBreakerManager::new();
        let strict = CircuitBreakerOptions::from(CircuitBreakerConfig {
            failure_threshold: 1,
            ..CircuitBreakerConfig::default()
        });
        let lenient = CircuitBreakerOptions::from(CircuitBreakerConfig {
            failure_threshold: 50,
            ..CircuitBreakerConfig::default()
        });

        manager.get_breaker("schedules", Some(&strict));
        let breaker = manager.get_breaker("schedules", Some(&lenient));

        assert_eq!(breaker.config().failure_threshold, 1);
    }

    #[test]
    fn test_defaults_without_options() {
        let manager = CircuitBreakerManager::new();

        let breaker = manager.get_breaker("weight-entries", None);

        assert_eq!(breaker.config(), &CircuitBreakerConfig::default());
    }

    #[test]
    fn test_from_config_uses_service_overrides() {
        let yaml = r#"
circuit_breaker:
  failure_threshold: 4
  reset_timeout: 5000
services:
  workouts:
    circuit_breaker:
      failure_threshold: 2
      success_threshold: 1
      reset_timeout: 1000
"#;
        let config: liftlog_config::ResilienceConfig = serde_yaml::from_str(yaml).unwrap();
        let manager = CircuitBreakerManager::from_config(&config, Arc::new(ManualClock::new()));

        let workouts = manager.get_breaker("workouts", None);
        assert_eq!(workouts.config().failure_threshold, 2);
        assert_eq!(workouts.config().success_threshold, 1);
        assert_eq!(workouts.config().reset_timeout, Duration::from_secs(1));

        let goals = manager.get_breaker("goals", None);
        assert_eq!(goals.config().failure_threshold, 4);
        assert_eq!(goals.config().reset_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_reset_all_and_stats() {
        let manager = CircuitBreakerManager::with_clock(Arc::new(ManualClock::new()));
        manager.get_breaker("workouts", None).open();
        manager.get_breaker("goals", None).record_failure();

        let stats = manager.all_stats();
        assert_eq!(
            stats.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["goals", "workouts"]
        );
        assert_eq!(stats["workouts"].state, CircuitState::Open);
        assert_eq!(stats["goals"].failures, 1);

        manager.reset_all();

        for stats in manager.all_stats().values() {
            assert_eq!(stats.state, CircuitState::Closed);
            assert_eq!(stats.failures, 0);
            assert_eq!(stats.successes, 0);
        }
    }

    #[test]
    fn test_default_manager_is_shared() {
        let first = default_manager();
        let second = default_manager();

        assert!(Arc::ptr_eq(&first, &second));
    }
}
