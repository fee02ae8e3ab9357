//! Daemon lifecycle management (stop, status).

use super::client::daemon_client;
use rpc_config_and_utils::{Config, Paths};
use std::path::Path;

/// Stop the daemon.
pub async fn stop_daemon(paths: &Paths, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let socket_path = paths.socket_file();
    let pid_path = paths.pid_file();

    if !socket_path.exists() {
        println!("Daemon is not running (socket not found)");
        if pid_path.exists() {
            let _ = std::fs::remove_file(&pid_path);
        }
        return Ok(());
    }

    // Try graceful shutdown first
    let client = daemon_client(paths, config, None);

    match client.call_function("system.shutdown", Vec::new()).await {
        Ok(response) if response.is_success() => println!("Daemon shutdown initiated"),
        Ok(response) => println!(
            "Shutdown failed: {} {}",
            response.status,
            response.details.unwrap_or_default()
        ),
        Err(e) => println!("Failed to connect to daemon: {}", e),
    }

    // Wait for daemon to stop (up to 3 seconds)
    for _ in 0..30 {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        if !socket_path.exists() {
            println!("Daemon stopped");
            return Ok(());
        }
    }

    if let Some(pid) = read_pid(&pid_path) {
        println!(
            "Daemon did not stop gracefully, sending SIGKILL to PID {}",
            pid
        );
        // SAFETY: kill(2) has no memory-safety preconditions.
        unsafe {
            libc::kill(pid, libc::SIGKILL);
        }
        let _ = std::fs::remove_file(&socket_path);
        let _ = std::fs::remove_file(&pid_path);
        println!("Daemon killed");
        return Ok(());
    }

    // Last resort: clean up socket file
    if socket_path.exists() {
        let _ = std::fs::remove_file(&socket_path);
        println!("Cleaned up stale socket file");
    }

    Ok(())
}

/// Check daemon status.
pub async fn check_status(paths: &Paths, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let socket_path = paths.socket_file();

    if !socket_path.exists() {
        println!("Daemon is not running (socket not found)");
        return Ok(());
    }

    let client = daemon_client(paths, config, None);

    match client.call_function("system.health", Vec::new()).await {
        Ok(response) if response.is_success() => {
            let result = response.result.unwrap_or_default();
            let field = |name: &str| {
                result
                    .get(name)
                    .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                    .unwrap_or_else(|| "unknown".to_string())
            };

            println!("Daemon is running");
            println!("  Status:  {}", field("status"));
            println!("  Version: {}", field("version"));
            println!("  PID:     {}", field("pid"));
            println!("  Socket:  {}", socket_path.display());

            if let Ok(functions) = client.list_functions().await {
                println!("  Functions: {}", functions.len());
            }
        }
        Ok(response) => println!(
            "Daemon returned error: {} {}",
            response.status,
            response.details.unwrap_or_default()
        ),
        Err(e) => {
            println!("Failed to connect to daemon: {}", e);
            println!("Daemon may not be running or socket may be stale");
        }
    }

    Ok(())
}

fn read_pid(pid_path: &Path) -> Option<i32> {
    std::fs::read_to_string(pid_path)
        .ok()?
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|pid| *pid > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::init::build_dispatcher;
    use crate::handlers::build_registry;
    use rpc_ipc::RpcServer;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::sync::broadcast;

    #[test]
    fn read_pid_parses_trimmed_positive_ids() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rpcd.pid");

        std::fs::write(&path, "4242\n").unwrap();
        assert_eq!(read_pid(&path), Some(4242));

        std::fs::write(&path, "0").unwrap();
        assert_eq!(read_pid(&path), None);

        std::fs::write(&path, "not a pid").unwrap();
        assert_eq!(read_pid(&path), None);

        assert_eq!(read_pid(&dir.path().join("missing.pid")), None);
    }

    #[tokio::test]
    async fn stop_without_socket_removes_stale_pid_file() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        paths.ensure_dirs().unwrap();
        std::fs::write(paths.pid_file(), "4242").unwrap();

        stop_daemon(&paths, &Config::default()).await.unwrap();

        assert!(!paths.pid_file().exists());
    }

    #[tokio::test]
    async fn stop_uses_configured_token() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        paths.ensure_dirs().unwrap();
        let config = Config {
            auth_tokens: vec!["secret".to_string()],
            ..Default::default()
        };

        let (shutdown_tx, _) = broadcast::channel(1);
        let registry = build_registry(shutdown_tx.clone()).unwrap();
        let server = RpcServer::with_shutdown_sender(
            &paths.socket_file().to_string_lossy(),
            build_dispatcher(registry, &config),
            shutdown_tx,
        );
        let running = tokio::spawn(async move { server.run().await });

        for _ in 0..200 {
            if paths.socket_file().exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(paths.socket_file().exists());

        check_status(&paths, &config).await.unwrap();
        stop_daemon(&paths, &config).await.unwrap();

        // Only an authorized system.shutdown ends the server loop.
        let stopped = tokio::time::timeout(Duration::from_secs(1), running)
            .await
            .expect("daemon kept running after stop");
        stopped.unwrap().unwrap();
        assert!(!paths.socket_file().exists());
    }
}
