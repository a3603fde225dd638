//! Logging initialization
//!
//! JSON structured logging through `tracing-subscriber`, filtered by
//! `RUST_LOG` when set. The synthesis engine only emits `tracing` events;
//! binaries embedding it call [`init_logging`] once at startup.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info,tidepool=debug,kube=info";

/// Errors that can occur during logging initialization
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive could not be parsed
    #[error("invalid log filter {filter:?}: {message}")]
    InvalidFilter {
        /// Directive that failed
        filter: String,
        /// Parser message
        message: String,
    },

    /// A global subscriber was already installed
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub default_filter: String,

    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: DEFAULT_LOG_FILTER.to_string(),
            json: true,
        }
    }
}

impl LoggingConfig {
    /// Build the filter: `RUST_LOG` wins, then the configured default
    pub fn env_filter(&self) -> Result<EnvFilter, TelemetryError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => {
                EnvFilter::try_new(&self.default_filter).map_err(|e| TelemetryError::InvalidFilter {
                    filter: self.default_filter.clone(),
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Install the global tracing subscriber
pub fn init_logging(config: LoggingConfig) -> Result<(), TelemetryError> {
    let env_filter = config.env_filter()?;

    let json_layer = config.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
    });
    let text_layer = (!config.json).then(|| tracing_subscriber::fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::SubscriberInit(e.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_json() {
        let config = LoggingConfig::default();
        assert!(config.json);
        assert_eq!(config.default_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn invalid_default_filter_is_reported() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LoggingConfig {
            default_filter: "tidepool=notalevel".to_string(),
            json: false,
        };
        let err = config.env_filter().expect_err("filter should be rejected");
        assert!(matches!(err, TelemetryError::InvalidFilter { .. }));
    }

    #[test]
    fn second_initialization_fails() {
        let first = init_logging(LoggingConfig::default());
        assert!(matches!(first, Ok(()) | Err(TelemetryError::SubscriberInit(_))));

        let second = init_logging(LoggingConfig::default());
        assert!(matches!(second, Err(TelemetryError::SubscriberInit(_))));
    }
}
