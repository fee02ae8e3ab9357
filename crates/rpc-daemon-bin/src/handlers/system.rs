//! Health and shutdown functions.

use rpc_core::{sync_callable, Namespace};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::info;

pub fn namespace(shutdown_tx: broadcast::Sender<()>) -> Namespace {
    Namespace::new("system")
        .function(
            "health",
            sync_callable(|_| {
                Ok(json!({
                    "status": "ok",
                    "version": env!("CARGO_PKG_VERSION"),
                    "pid": std::process::id(),
                }))
            }),
        )
        .function(
            "shutdown",
            sync_callable(move |_| {
                info!("Shutdown requested");
                // No receivers only means the server already stopped.
                let _ = shutdown_tx.send(());
                Ok(json!({ "status": "shutting_down" }))
            }),
        )
}
