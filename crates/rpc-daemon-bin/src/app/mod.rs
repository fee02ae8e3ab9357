//! Application wiring and lifecycle management.

mod call;
mod client;
mod init;
mod lifecycle;

pub use call::{call, CallArgs};
pub use init::run_daemon;
pub use lifecycle::{check_status, stop_daemon};
