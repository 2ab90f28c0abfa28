//! Configuration loading and environment variable handling

use crate::domains::logging::{LogFormat, LogLevel, LoggingConfig};
use crate::domains::resilience::ResilienceConfig;
use crate::domains::LiftlogConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "LIFTLOG".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<LiftlogConfig> {
        let content = std::fs::read_to_string(path)?;
        self.from_yaml(&content)
    }

    /// Load configuration from YAML text with environment overrides
    pub fn from_yaml(&self, content: &str) -> ConfigResult<LiftlogConfig> {
        let mut config: LiftlogConfig = serde_yaml::from_str(content)?;

        // Apply environment variable overrides
        self.apply_env_overrides(&mut config)?;

        // Validate all domains
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<LiftlogConfig> {
        let mut config = LiftlogConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<LiftlogConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut LiftlogConfig) -> ConfigResult<()> {
        self.apply_logging_overrides(&mut config.logging)?;
        self.apply_resilience_overrides(&mut config.resilience)?;
        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(&self, config: &mut LoggingConfig) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
            log::debug!("Applied override {}_LOG_LEVEL={}", self.prefix, log_level);
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
            log::debug!("Applied override {}_LOG_FORMAT={}", self.prefix, format);
        }

        Ok(())
    }

    /// Apply default retry and breaker overrides
    ///
    /// Per-service overrides are only read from the file.
    fn apply_resilience_overrides(&self, config: &mut ResilienceConfig) -> ConfigResult<()> {
        if let Some(attempts) = self.parse_env_var("RETRY_MAX_ATTEMPTS")? {
            config.retry.max_attempts = attempts;
        }

        if let Some(millis) = self.parse_env_var("RETRY_INITIAL_DELAY_MS")? {
            config.retry.initial_delay = Duration::from_millis(millis);
        }

        if let Some(millis) = self.parse_env_var("RETRY_MAX_DELAY_MS")? {
            config.retry.max_delay = Duration::from_millis(millis);
        }

        if let Some(threshold) = self.parse_env_var("BREAKER_FAILURE_THRESHOLD")? {
            config.circuit_breaker.failure_threshold = threshold;
        }

        if let Some(threshold) = self.parse_env_var("BREAKER_SUCCESS_THRESHOLD")? {
            config.circuit_breaker.success_threshold = threshold;
        }

        if let Some(millis) = self.parse_env_var("BREAKER_RESET_TIMEOUT_MS")? {
            config.circuit_breaker.reset_timeout = Duration::from_millis(millis);
        }

        Ok(())
    }

    /// Parse a prefixed environment variable if it is set
    fn parse_env_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(name) {
            Ok(value) => {
                let parsed = value
                    .trim()
                    .parse()
                    .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", name, e)))?;
                log::debug!("Applied override {}_{}={}", self.prefix, name, value.trim());
                Ok(Some(parsed))
            }
            Err(_) => Ok(None),
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
