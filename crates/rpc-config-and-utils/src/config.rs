//! Configuration management for the daemon.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Seconds a finished deferred handle stays pollable.
pub const DEFAULT_HANDLE_TTL_SECS: u64 = 300;

/// Deferred invocations allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT_DEFERRED: usize = 64;

const ENV_LOG_LEVEL: &str = "RPCD_LOG_LEVEL";
const ENV_DEFAULT_TIMEOUT_MS: &str = "RPCD_DEFAULT_TIMEOUT_MS";
const ENV_AUTH_TOKEN: &str = "RPCD_AUTH_TOKEN";

/// Main daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Timeout applied to calls that do not carry their own.
    pub default_timeout_ms: Option<u64>,
    pub handle_ttl_secs: u64,
    pub max_concurrent_deferred: usize,
    /// Accepted request tokens. Empty disables token checks.
    pub auth_tokens: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            default_timeout_ms: None,
            handle_ttl_secs: DEFAULT_HANDLE_TTL_SECS,
            max_concurrent_deferred: DEFAULT_MAX_CONCURRENT_DEFERRED,
            auth_tokens: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a file, falling back to defaults, then
    /// apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let config_path = paths.config_file();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    ///
    /// `RPCD_LOG_LEVEL` replaces the level, `RPCD_DEFAULT_TIMEOUT_MS` sets the
    /// default timeout, and `RPCD_AUTH_TOKEN` adds one accepted token.
    pub fn apply_env<F>(&mut self, lookup: F) -> CoreResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(log_level) = lookup(ENV_LOG_LEVEL).and_then(non_empty) {
            self.log_level = log_level;
        }

        if let Some(raw) = lookup(ENV_DEFAULT_TIMEOUT_MS).and_then(non_empty) {
            let ms = raw.parse::<u64>().map_err(|_| {
                CoreError::Config(format!("{} must be milliseconds, got {:?}", ENV_DEFAULT_TIMEOUT_MS, raw))
            })?;
            self.default_timeout_ms = Some(ms);
        }

        if let Some(token) = lookup(ENV_AUTH_TOKEN).and_then(non_empty) {
            if !self.auth_tokens.contains(&token) {
                self.auth_tokens.push(token);
            }
        }

        Ok(())
    }

    /// Reject values the dispatcher cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_concurrent_deferred == 0 {
            return Err(CoreError::Config(
                "max_concurrent_deferred must be at least 1".to_string(),
            ));
        }
        if self.default_timeout_ms == Some(0) {
            return Err(CoreError::Config(
                "default_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }

    pub fn handle_ttl(&self) -> Duration {
        Duration::from_secs(self.handle_ttl_secs)
    }
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
