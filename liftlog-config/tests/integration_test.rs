//! Integration tests for liftlog-config

use liftlog_config::*;
use std::io::Write;
use std::time::Duration;
use temp_env::with_vars;

const RESILIENCE_VARS: [&str; 8] = [
    "LIFTLOG_LOG_LEVEL",
    "LIFTLOG_LOG_FORMAT",
    "LIFTLOG_RETRY_MAX_ATTEMPTS",
    "LIFTLOG_RETRY_INITIAL_DELAY_MS",
    "LIFTLOG_RETRY_MAX_DELAY_MS",
    "LIFTLOG_BREAKER_FAILURE_THRESHOLD",
    "LIFTLOG_BREAKER_SUCCESS_THRESHOLD",
    "LIFTLOG_BREAKER_RESET_TIMEOUT_MS",
];

/// Every loader variable, unset unless given in `set`
fn env_with(set: &[(&'static str, &'static str)]) -> Vec<(&'static str, Option<&'static str>)> {
    RESILIENCE_VARS
        .iter()
        .map(|name| {
            let value = set.iter().find(|(key, _)| key == name).map(|(_, v)| *v);
            (*name, value)
        })
        .collect()
}

#[test]
fn test_default_config_validation() {
    let config = LiftlogConfig::default();
    assert!(config.validate_all().is_ok());
}

#[test]
fn test_config_loader_from_env() {
    let vars = env_with(&[
        ("LIFTLOG_LOG_LEVEL", "debug"),
        ("LIFTLOG_LOG_FORMAT", "json"),
        ("LIFTLOG_RETRY_MAX_ATTEMPTS", "5"),
        ("LIFTLOG_RETRY_INITIAL_DELAY_MS", "250"),
        ("LIFTLOG_BREAKER_FAILURE_THRESHOLD", "2"),
        ("LIFTLOG_BREAKER_RESET_TIMEOUT_MS", "15000"),
    ]);

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.resilience.retry.max_attempts, 5);
        assert_eq!(config.resilience.retry.initial_delay, Duration::from_millis(250));
        assert_eq!(config.resilience.circuit_breaker.failure_threshold, 2);
        assert_eq!(
            config.resilience.circuit_breaker.reset_timeout,
            Duration::from_secs(15)
        );
    });
}

#[test]
fn test_invalid_env_value_is_rejected() {
    let vars = env_with(&[("LIFTLOG_RETRY_MAX_ATTEMPTS", "many")]);

    with_vars(vars, || {
        let error = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(error, ConfigError::EnvError(_)));
        assert!(error.to_string().contains("RETRY_MAX_ATTEMPTS"));
    });
}

#[test]
fn test_env_override_is_validated() {
    let vars = env_with(&[("LIFTLOG_BREAKER_SUCCESS_THRESHOLD", "0")]);

    with_vars(vars, || {
        let error = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(error, ConfigError::DomainError { .. }));
    });
}

#[test]
fn test_custom_prefix() {
    with_vars(
        [
            ("FITNESS_RETRY_MAX_ATTEMPTS", Some("7")),
            ("LIFTLOG_RETRY_MAX_ATTEMPTS", Some("2")),
        ],
        || {
            let config = ConfigLoader::with_prefix("FITNESS").from_env().unwrap();
            assert_eq!(config.resilience.retry.max_attempts, 7);
        },
    );
}

#[test]
fn test_load_from_file() {
    let yaml = r#"
logging:
  level: warn
  format: compact

resilience:
  retry:
    max_attempts: 4
    initial_delay: 500
    max_delay: 8000
    backoff_multiplier: 1.5
    jitter: 0.2
  circuit_breaker:
    failure_threshold: 3
    reset_timeout: 30000
  services:
    workouts:
      circuit_breaker:
        failure_threshold: 2
        success_threshold: 1
        reset_timeout: 10000
    user-profiles:
      retry:
        max_attempts: 1
"#;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    with_vars(env_with(&[]), || {
        let config = ConfigLoader::new().load(Some(file.path())).unwrap();

        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.logging.format, LogFormat::Compact);

        let retry = &config.resilience.retry;
        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.initial_delay, Duration::from_millis(500));
        assert_eq!(retry.max_delay, Duration::from_secs(8));
        assert_eq!(retry.backoff_multiplier, 1.5);

        let breaker = &config.resilience.circuit_breaker;
        assert_eq!(breaker.failure_threshold, 3);
        assert_eq!(breaker.success_threshold, 2);

        let workouts = config.resilience.services["workouts"]
            .circuit_breaker
            .as_ref()
            .unwrap();
        assert_eq!(workouts.reset_timeout, Duration::from_secs(10));
        assert_eq!(
            config.resilience.services["user-profiles"]
                .retry
                .as_ref()
                .unwrap()
                .max_attempts,
            1
        );
    });
}

#[test]
fn test_env_overrides_file_values() {
    let vars = env_with(&[("LIFTLOG_RETRY_MAX_ATTEMPTS", "9")]);

    with_vars(vars, || {
        let config = ConfigLoader::new()
            .from_yaml("resilience:\n  retry:\n    max_attempts: 4\n")
            .unwrap();
        assert_eq!(config.resilience.retry.max_attempts, 9);
    });
}

#[test]
fn test_invalid_file_is_rejected() {
    with_vars(env_with(&[]), || {
        let loader = ConfigLoader::new();

        let error = loader
            .from_yaml("resilience:\n  retry:\n    jitter: 2.0\n")
            .unwrap_err();
        assert!(error.to_string().contains("jitter"));

        let error = loader.from_yaml("logging: [not, a, map]").unwrap_err();
        assert!(matches!(error, ConfigError::ParseError(_)));

        let error = loader.from_file("/nonexistent/liftlog.yaml").unwrap_err();
        assert!(matches!(error, ConfigError::FileReadError(_)));
    });
}

#[test]
fn test_sample_config_round_trips() {
    let sample = LiftlogConfig::generate_sample();
    let parsed: LiftlogConfig = serde_yaml::from_str(&sample).unwrap();

    assert_eq!(parsed, LiftlogConfig::default());
    assert!(sample.contains("failure_threshold: 5"));
    assert!(sample.contains("initial_delay: 1000"));
}
