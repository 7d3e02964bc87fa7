//! Daemon mode - background process serving the store
//!
//! One daemon owns one socket address and one store file. It:
//! 1. Claims the socket address exclusively (a lock file next to the socket)
//! 2. Opens the store
//! 3. Binds the socket and serves each connection on its own task
//! 4. On SIGINT/SIGTERM or a `shutdown` request, stops accepting, lets
//!    in-flight requests finish, and releases the address

mod handler;
mod lifecycle;
mod server;

pub use lifecycle::{Daemon, DaemonOptions, ServerIdentity, ShutdownHandle};

use crate::common::Result;

/// Run in daemon mode until signalled or asked to shut down
pub async fn run(options: DaemonOptions) -> Result<()> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "Starting store daemon"
    );

    let daemon = match Daemon::start(options) {
        Ok(daemon) => daemon,
        Err(e) => {
            tracing::error!("Daemon failed to start: {}", e);
            return Err(e);
        }
    };

    daemon.run().await
}
