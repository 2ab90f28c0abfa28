//! Logging setup for Liftlog
//!
//! Installs a `tracing` subscriber driven by the `logging` configuration
//! domain. Records emitted through the `log` facade, as the resilience crate
//! does, are forwarded to the same subscriber.

pub mod init;

pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing};
pub use liftlog_config::{LogFormat, LogLevel, LoggingConfig};
