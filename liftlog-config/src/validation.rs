//! Configuration validation traits and utilities

use crate::error::{ConfigError, ConfigResult};

/// Trait for validatable configuration
pub trait Validatable {
    /// Validate the configuration
    fn validate(&self) -> ConfigResult<()>;

    /// Get the domain name for error reporting
    fn domain_name(&self) -> &'static str;

    /// Helper to create a domain-specific validation error
    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::DomainError {
            domain: self.domain_name().to_string(),
            message: message.into(),
        }
    }
}

/// Validate a required string field
pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.is_empty() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} cannot be empty", field_name),
        });
    }
    Ok(())
}

/// Validate a positive number
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must be greater than 0, got {}", field_name, value),
        });
    }
    Ok(())
}

/// Validate that a value lies within `[min, max]`
pub fn validate_range(
    value: f64,
    min: f64,
    max: f64,
    field_name: &str,
    domain: &str,
) -> ConfigResult<()> {
    if !(min..=max).contains(&value) {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!(
                "{} must be between {} and {}, got {}",
                field_name, min, max, value
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive(1u32, "threshold", "test").is_ok());
        let error = validate_positive(0u32, "threshold", "test").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Domain configuration error in test: threshold must be greater than 0, got 0"
        );
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range(0.0, 0.0, 1.0, "jitter", "test").is_ok());
        assert!(validate_range(1.0, 0.0, 1.0, "jitter", "test").is_ok());
        assert!(validate_range(-0.1, 0.0, 1.0, "jitter", "test").is_err());
        assert!(validate_range(f64::NAN, 0.0, 1.0, "jitter", "test").is_err());
    }
}
