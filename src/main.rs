//! shstore - shell storage daemon and client
//!
//! Runs the daemon that serves command history, directory history and shared
//! variables to shell instances, and offers client commands for talking to it.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use commands::Commands;
use shstore::common::{config::Config, logging, paths, Result};
use shstore::daemon::{self, DaemonOptions};
use shstore::{cli, commands};

#[derive(Parser)]
#[command(name = "shstore", about = "Shell storage daemon")]
#[command(version, long_about = None)]
struct Cli {
    /// Daemon socket path (default: runtime dir)
    #[arg(long, global = true)]
    sock: Option<PathBuf>,

    /// Configuration file (default: config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let sock_path = config.sock_path(cli.sock);

    match cli.command {
        Commands::Daemon { db } => {
            let _log_guard = logging::init_daemon(paths::log_dir().as_deref());
            let options = DaemonOptions {
                sock_path,
                db_path: config.db_path(db)?,
                client_idle_timeout: config
                    .daemon
                    .client_idle_timeout_secs
                    .map(Duration::from_secs),
            };
            daemon::run(options).await
        }
        command => {
            logging::init_cli();
            cli::dispatch(&config, sock_path, command).await
        }
    }
}
