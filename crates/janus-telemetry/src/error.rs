//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while bootstrapping telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured log level filter could not be parsed.
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// Failed to install the logging subscriber.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),
}
