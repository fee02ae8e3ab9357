//! Logging initialization for the daemon.
//!
//! Thin wrapper over the observability crate: structured JSONL goes to
//! `~/.rpcd/logs/dev.jsonl` (or the given path), with a compact copy on
//! stderr for foreground runs.

use std::io;
use std::path::{Path, PathBuf};

/// Initialize the logging system for the daemon.
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// ```ignore
/// init_logging("info", Some(&paths.log_file()))?;
/// tracing::info!("Daemon started");
/// ```
pub fn init_logging(level: &str, log_path: Option<&Path>) -> io::Result<PathBuf> {
    observability::init_with_config(observability::LogConfig {
        service_name: "rpcd".into(),
        default_level: parse_level(level).as_str().to_ascii_lowercase(),
        log_path: log_path.map(Path::to_path_buf),
        also_stderr: true,
    })
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_all_variants() {
        assert_eq!(parse_level("trace"), tracing::Level::TRACE);
        assert_eq!(parse_level("debug"), tracing::Level::DEBUG);
        assert_eq!(parse_level("info"), tracing::Level::INFO);
        assert_eq!(parse_level("warn"), tracing::Level::WARN);
        assert_eq!(parse_level("warning"), tracing::Level::WARN);
        assert_eq!(parse_level("error"), tracing::Level::ERROR);
    }

    #[test]
    fn parse_level_case_insensitive() {
        assert_eq!(parse_level("Debug"), tracing::Level::DEBUG);
        assert_eq!(parse_level("WARNING"), tracing::Level::WARN);
    }

    #[test]
    fn parse_level_unknown_defaults_to_info() {
        assert_eq!(parse_level(""), tracing::Level::INFO);
        assert_eq!(parse_level("verbose"), tracing::Level::INFO);
    }
}
