//! rpcd - local RPC daemon and command-line client.

mod app;
mod handlers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rpc_config_and_utils::{init_logging, Config, Paths};

/// rpcd command-line interface.
#[derive(Parser)]
#[command(name = "rpcd")]
#[command(about = "Local RPC daemon: registry, dispatcher and Unix-socket transport")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for runtime files (socket, logs, config). Defaults to ~/.rpcd
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon
    Start {
        /// Run in foreground (don't daemonize)
        #[arg(short, long)]
        foreground: bool,
    },
    /// Stop the daemon
    Stop,
    /// Check daemon status
    Status,
    /// Call a function on the running daemon
    Call(app::CallArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let mut config = Config::load(&paths)?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    match cli.command {
        Some(Commands::Start { foreground }) => {
            init_logging(&config.log_level, Some(&paths.log_file()))?;
            app::run_daemon(config, paths, foreground).await?;
        }
        None => {
            // Default to start in foreground if no command given
            init_logging(&config.log_level, Some(&paths.log_file()))?;
            app::run_daemon(config, paths, true).await?;
        }
        Some(Commands::Stop) => {
            app::stop_daemon(&paths, &config).await?;
        }
        Some(Commands::Status) => {
            app::check_status(&paths, &config).await?;
        }
        Some(Commands::Call(args)) => {
            app::call(&paths, &config, args).await?;
        }
    }

    Ok(())
}
