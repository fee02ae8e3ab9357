//! File system paths for the daemon.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Runtime directory under the user's home.
const BASE_DIR_NAME: &str = ".rpcd";
/// IPC socket filename under the base runtime directory.
const SOCKET_NAME: &str = "rpcd.sock";

/// Manages file system paths for the daemon.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for daemon runtime files (~/.rpcd)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.rpcd`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.rpcd).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.rpcd/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the IPC socket path (~/.rpcd/rpcd.sock).
    pub fn socket_file(&self) -> PathBuf {
        self.base_dir.join(SOCKET_NAME)
    }

    /// Get the PID file path (~/.rpcd/rpcd.pid).
    pub fn pid_file(&self) -> PathBuf {
        self.base_dir.join("rpcd.pid")
    }

    /// Get the logs directory (~/.rpcd/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the structured log file path (~/.rpcd/logs/dev.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("dev.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
