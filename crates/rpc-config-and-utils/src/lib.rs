//! Configuration, file system paths, and logging setup for rpcd.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_HANDLE_TTL_SECS, DEFAULT_LOG_LEVEL, DEFAULT_MAX_CONCURRENT_DEFERRED,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
