//! Logging bootstrap.
//!
//! Built on `tracing` with configurable output:
//! - Pretty console output for interactive use
//! - JSON output for log aggregation
//! - Optional daily-rotated file output via `tracing-appender`

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console format.
    #[default]
    Pretty,
    /// Newline-delimited JSON.
    Json,
}

/// Logging settings from the `logging` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level filter, e.g. `info` or `sirocco_gateway=debug`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Whether to log to stdout.
    pub console_enabled: bool,
    /// Whether to log to a daily-rotated file.
    pub file_enabled: bool,
    /// Directory for log files.
    pub path: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            console_enabled: true,
            file_enabled: false,
            path: "./logs".to_string(),
        }
    }
}

/// Errors that can occur during logging initialization.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Log directory could not be created.
    #[error("Failed to create log directory: {0}")]
    DirectoryCreation(#[from] std::io::Error),

    /// Subscriber was already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Initializes the global tracing subscriber from the given config.
///
/// Returns a guard that must be kept alive for the duration of the
/// program when file output is enabled, so buffered log lines are
/// flushed on shutdown.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
///
/// # Example
///
/// ```no_run
/// use sirocco_core::logging::{init_logging, LogConfig};
///
/// let config = LogConfig::default();
/// let _guard = init_logging(&config).expect("Failed to initialize logging");
/// ```
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let mut layers: Vec<
        Box<
            dyn Layer<tracing_subscriber::layer::Layered<EnvFilter, tracing_subscriber::Registry>>
                + Send
                + Sync,
        >,
    > = Vec::new();
    let mut guard = None;

    if config.console_enabled {
        let layer = fmt::layer().with_target(true);
        match config.format {
            LogFormat::Json => layers.push(Box::new(layer.json().flatten_event(true))),
            LogFormat::Pretty => layers.push(Box::new(layer)),
        }
    }

    if config.file_enabled {
        std::fs::create_dir_all(&config.path)?;
        let file_appender = tracing_appender::rolling::daily(&config.path, "sirocco.log");
        let (non_blocking, g) = tracing_appender::non_blocking(file_appender);
        guard = Some(g);

        let layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .json()
            .flatten_event(true);
        layers.push(Box::new(layer));
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.console_enabled);
        assert!(!config.file_enabled);
        assert_eq!(config.path, "./logs");
    }

    #[test]
    fn test_format_deserialization() {
        let config: LogConfig =
            serde_yaml::from_str("level: debug\nformat: json\nfile_enabled: true\n").unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.file_enabled);
        // unspecified fields fall back to defaults
        assert!(config.console_enabled);
    }
}
