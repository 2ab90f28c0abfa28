//! Domain-specific configuration modules

pub mod logging;
pub mod resilience;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main Liftlog configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct LiftlogConfig {
    /// Logging configuration
    pub logging: logging::LoggingConfig,

    /// Retry and circuit breaker configuration for outbound calls
    pub resilience: resilience::ResilienceConfig,
}

impl LiftlogConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.logging.validate()?;
        self.resilience.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = LiftlogConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
