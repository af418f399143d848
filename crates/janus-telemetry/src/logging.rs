//! Logging bootstrap.
//!
//! Installs the `tracing-subscriber` stack that [`TracingSink`] events flow
//! through: JSON output for production, pretty output for development.
//!
//! # Example
//!
//! ```rust,ignore
//! use janus_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default())?;
//! ```
//!
//! [`TracingSink`]: crate::TracingSink

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Log level filter (e.g. "info", "janus=debug").
    pub level: String,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to include the target (module path) in output.
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true, // JSON by default for production
            include_target: true,
        }
    }
}

impl LogConfig {
    /// Development configuration: human-readable output at debug level.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            include_target: true,
        }
    }

    /// Production configuration: JSON output at info level.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }
}

/// Initializes the logging subsystem.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidLevel`] for an unparsable filter and
/// [`TelemetryError::LoggingInit`] if a global subscriber is already
/// installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| TelemetryError::InvalidLevel(e.to_string()))?;

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    Ok(())
}

/// Canonical field names used by the janus middleware stages.
///
/// Use these for consistency when asserting on or extending entries.
pub mod fields {
    /// HTTP response status code.
    pub const STATUS: &str = "status";

    /// HTTP request method.
    pub const METHOD: &str = "method";

    /// Request path, captured before downstream stages run.
    pub const PATH: &str = "path";

    /// Raw query string.
    pub const QUERY: &str = "query";

    /// Client address, honoring `x-forwarded-for`.
    pub const CLIENT_IP: &str = "client_ip";

    /// The `user-agent` header value.
    pub const USER_AGENT: &str = "user_agent";

    /// Wall-clock latency of the downstream call.
    pub const LATENCY: &str = "latency";

    /// Captured request body bytes.
    pub const REQUEST_BODY: &str = "request_body";

    /// Per-request correlation identifier.
    pub const CORRELATION_ID: &str = "correlation_id";

    /// Redundant textual timestamp.
    pub const TIME: &str = "time";

    /// A handler-reported or recovery error.
    pub const ERROR: &str = "error";

    /// Raw panic payload text on a recovery record.
    pub const PANIC: &str = "panic";

    /// Request dump (method and headers, never the body).
    pub const REQUEST: &str = "request";

    /// Rendered call-stack text.
    pub const STACK: &str = "stack";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert!(config.json_format);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_development_config() {
        let config = LogConfig::development();
        assert!(!config.json_format);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let config = LogConfig {
            level: "no such level!!".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            init_logging(&config),
            Err(TelemetryError::InvalidLevel(_))
        ));
    }

    #[test]
    fn test_disabled_logging() {
        let config = LogConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(init_logging(&config).is_ok());
    }
}
