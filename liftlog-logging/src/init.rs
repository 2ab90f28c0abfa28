//! Subscriber installation

use anyhow::Result;
use liftlog_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Build the filter for a configured level
///
/// `RUST_LOG` directives take precedence when set, so a single crate can be
/// turned up without touching the configuration file.
pub fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_str()))
}

/// Initialize logging from configuration
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(config))
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    already_initialized_is_ok(result)
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    already_initialized_is_ok(
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .try_init(),
    )
}

fn already_initialized_is_ok(
    result: std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>,
) -> Result<()> {
    // A second call finds the global subscriber (or log bridge) already set
    if let Err(error) = result {
        tracing::debug!("Global tracing subscriber already initialized, skipping: {}", error);
    }
    Ok(())
}
