//! # Observability
//!
//! Logging setup shared by rpcd processes.
//!
//! Services call [`init`] or [`init_with_config`] once at startup and use
//! the standard `tracing` macros everywhere else. Every event becomes one
//! JSON object per line in a central append-only file, by default
//! `~/.rpcd/logs/dev.jsonl`:
//!
//! - `tail -f ~/.rpcd/logs/dev.jsonl | jq` to follow a running daemon
//! - `jq 'select(.fields.request_id == "abc")'` to trace one request
//!
//! Writes are flushed per line, so several processes can share the file.
//!
//! ## Usage
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "rpcd".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! })?;
//! tracing::info!("service started");
//! ```

mod json_layer;
mod sink;

pub use json_layer::{JsonLayer, LogEntry};
pub use sink::{default_log_path, LogFileWriter};

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, written into every log line.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Log file path. Defaults to `~/.rpcd/logs/dev.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit compact human-readable logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging for `service_name` with default settings.
pub fn init(service_name: &str) -> io::Result<PathBuf> {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Install the global subscriber described by `config`.
///
/// Returns the path of the JSONL file being written. Fails when the file
/// cannot be opened or a global subscriber is already installed.
pub fn init_with_config(config: LogConfig) -> io::Result<PathBuf> {
    let log_path = match config.log_path.clone() {
        Some(path) => path,
        None => default_log_path().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "home directory not found")
        })?,
    };

    let writer = LogFileWriter::open(&log_path)?;
    let json_layer = JsonLayer::new(config.service_name.clone(), writer);

    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(io::stderr)
            .with_filter(env_filter(&config.default_level))
    });

    tracing_subscriber::registry()
        .with(json_layer.with_filter(env_filter(&config.default_level)))
        .with(stderr_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        log_path = %log_path.display(),
        "observability initialized"
    );

    Ok(log_path)
}

/// `RUST_LOG` when set, otherwise `default_level`.
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn, Level};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "unknown");
        assert_eq!(config.default_level, "info");
        assert!(config.log_path.is_none());
        assert!(!config.also_stderr);
    }
}
