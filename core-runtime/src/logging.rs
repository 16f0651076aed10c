//! # Logging Bootstrap
//!
//! Structured logging on top of the `tracing` ecosystem. Hosts call
//! [`init_logging`] once at startup; every crate in the engine then logs
//! through the standard `tracing` macros.
//!
//! Filtering follows `tracing-subscriber`'s `EnvFilter` syntax and can be
//! overridden with the `TONEARM_LOG` environment variable:
//!
//! ```text
//! TONEARM_LOG=core_player=debug,core_runtime=info
//! ```

use crate::error::{Error, Result};
use tracing_subscriber::filter::EnvFilter;

/// Environment variable consulted for filter overrides.
pub const LOG_ENV_VAR: &str = "TONEARM_LOG";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output with colors.
    Pretty,
    /// Single-line output for terminals and CI.
    #[default]
    Compact,
    /// Structured JSON for machine ingestion.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Default filter directive when the environment variable is unset,
    /// e.g. `"info"` or `"core_player=debug"`.
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            default_filter: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }
}

/// Installs the global `tracing` subscriber.
///
/// Returns an error if a subscriber is already installed or the filter
/// directive does not parse.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).or_else(|_| {
        EnvFilter::try_new(&config.default_filter)
            .map_err(|e| Error::Bootstrap(format!("invalid log filter: {e}")))
    })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| Error::Bootstrap(format!("failed to install subscriber: {e}")))?;

    tracing::debug!(format = ?config.format, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_compact_info() {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.default_filter, "info");
    }

    #[test]
    fn builder_style_setters() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_default_filter("core_player=trace");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.default_filter, "core_player=trace");
    }

    #[test]
    fn bad_filter_directive_is_reported() {
        let config = LoggingConfig::default().with_default_filter("===");
        // Whether init fails on the filter or on double-install, it must
        // not panic.
        let _ = init_logging(config);
    }
}
