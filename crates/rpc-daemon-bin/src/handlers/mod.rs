//! Function namespaces registered by the daemon at startup.

mod system;
mod util;

use rpc_core::{Registry, RpcResult};
use tokio::sync::broadcast;
use tracing::info;

/// Build the daemon's registry. `shutdown_tx` is fired by `system.shutdown`.
pub fn build_registry(shutdown_tx: broadcast::Sender<()>) -> RpcResult<Registry> {
    let mut builder = Registry::builder();
    builder
        .register(system::namespace(shutdown_tx))?
        .register(util::namespace())?;

    let registry = builder.build();
    info!(functions = registry.len(), "Registry built");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_builtin_namespaces() {
        let (tx, _rx) = broadcast::channel(1);
        let registry = build_registry(tx).unwrap();

        assert_eq!(
            registry.names(),
            vec![
                "system.health",
                "system.shutdown",
                "util.add",
                "util.echo",
                "util.fail",
                "util.sleep",
            ]
        );
        assert!(!registry.names().iter().any(|n| n.starts_with(rpc_ipc::RESERVED_PREFIX)));
    }
}
