//! Daemon initialization.

use crate::handlers::build_registry;
use rpc_config_and_utils::{Config, Paths};
use rpc_core::{Dispatcher, HandleTable, Registry, StaticTokens};
use rpc_ipc::{RpcClient, RpcServer};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Upper bound on the interval between expired-handle sweeps.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Run the daemon.
pub async fn run_daemon(
    config: Config,
    paths: Paths,
    _foreground: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Singleton enforcement: check if daemon is already running
    let socket_path = paths.socket_file();
    if socket_path.exists() {
        let client = RpcClient::new(&socket_path.to_string_lossy());
        if client.is_daemon_running().await {
            return Err("Daemon is already running. Use 'rpcd stop' to stop it first.".into());
        }
        // Socket exists but daemon not responding - clean up stale socket
        warn!(socket = %socket_path.display(), "Removing stale socket file");
        let _ = std::fs::remove_file(&socket_path);
    }

    // Clean up stale PID file if it exists
    let pid_file = paths.pid_file();
    if pid_file.exists() {
        let _ = std::fs::remove_file(&pid_file);
    }

    info!("Starting rpcd");
    info!(
        default_timeout_ms = ?config.default_timeout_ms,
        handle_ttl_secs = config.handle_ttl_secs,
        max_concurrent_deferred = config.max_concurrent_deferred,
        token_policy = !config.auth_tokens.is_empty(),
        "Configuration loaded"
    );

    paths.ensure_dirs()?;

    let pid = std::process::id();
    std::fs::write(&pid_file, pid.to_string())?;
    info!(pid = pid, "Daemon started");

    let (shutdown_tx, _) = broadcast::channel(1);
    let registry = build_registry(shutdown_tx.clone())?;
    let dispatcher = build_dispatcher(registry, &config);

    let server = RpcServer::with_shutdown_sender(
        &socket_path.to_string_lossy(),
        dispatcher.clone(),
        shutdown_tx.clone(),
    );

    spawn_handle_sweeper(dispatcher.handles().clone(), shutdown_tx.subscribe());
    spawn_signal_listener(shutdown_tx);

    info!(socket = %socket_path.display(), "IPC server starting");
    let server_result = server.run().await;

    // Cleanup
    let _ = std::fs::remove_file(&pid_file);
    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");

    server_result.map_err(|e| e.into())
}

/// Apply the configured timeout, handle lifetime, concurrency limit and tokens.
pub(crate) fn build_dispatcher(registry: Registry, config: &Config) -> Dispatcher {
    let mut dispatcher = Dispatcher::new(registry)
        .with_handle_ttl(config.handle_ttl())
        .with_max_concurrent_deferred(config.max_concurrent_deferred);

    if let Some(timeout) = config.default_timeout() {
        dispatcher = dispatcher.with_default_timeout(timeout);
    }
    if !config.auth_tokens.is_empty() {
        dispatcher = dispatcher.with_token_policy(StaticTokens::new(config.auth_tokens.clone()));
    }

    dispatcher
}

/// Periodically drop expired deferred handles until shutdown.
fn spawn_handle_sweeper(handles: HandleTable, mut shutdown_rx: broadcast::Receiver<()>) {
    let period = handles.ttl().clamp(Duration::from_secs(1), MAX_SWEEP_INTERVAL);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = handles.sweep();
                    if removed > 0 {
                        debug!(removed, remaining = handles.len(), "Swept expired handles");
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    });
}

/// Turn Ctrl-C into a graceful shutdown.
fn spawn_signal_listener(shutdown_tx: broadcast::Sender<()>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            let _ = shutdown_tx.send(());
        }
    });
}
