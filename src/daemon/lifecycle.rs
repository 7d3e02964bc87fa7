//! Daemon startup and shutdown
//!
//! Startup order matters: the address is claimed and the store opened before
//! the listener is bound, so a client racing the daemon sees a refused
//! connection rather than a half-initialized server.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fs2::FileExt;
use tokio::sync::watch;

use crate::common::{paths, Error, Result};
use crate::ipc::{transport, PROTOCOL_VERSION};
use crate::store::{SqliteStore, Store};

use super::server::{self, ServerState};

/// Identity a daemon reports for its whole lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerIdentity {
    /// Protocol version compiled into the daemon
    pub version: u32,
    /// Process id of the daemon
    pub pid: u32,
}

impl ServerIdentity {
    /// Identity of the current process
    pub fn current() -> Self {
        Self {
            version: PROTOCOL_VERSION,
            pid: std::process::id(),
        }
    }
}

/// Where and how the daemon serves
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    /// Socket path to listen on
    pub sock_path: PathBuf,
    /// Store database path
    pub db_path: PathBuf,
    /// Drop a connection that sends nothing for this long, if set
    pub client_idle_timeout: Option<Duration>,
}

/// Cloneable trigger for a graceful shutdown
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub(super) fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self(Arc::new(tx))
    }

    /// Stop accepting connections and let in-flight requests finish
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }

    pub(super) fn subscribe(&self) -> watch::Receiver<bool> {
        self.0.subscribe()
    }
}

/// Exclusive ownership of a socket address, held through an advisory lock
/// on a file next to the socket
///
/// Dropping the claim removes the socket file and releases the lock.
struct AddressClaim {
    sock_path: PathBuf,
    _lock: File,
}

impl AddressClaim {
    fn acquire(sock_path: &Path) -> Result<Self> {
        let unavailable = |source| Error::AddressUnavailable {
            path: sock_path.to_path_buf(),
            source,
        };

        paths::ensure_parent_dir(sock_path).map_err(unavailable)?;

        let lock_path = paths::lock_path_for(sock_path);
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(unavailable)?;

        if let Err(e) = lock.try_lock_exclusive() {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                return Err(Error::AddressInUse(sock_path.to_path_buf()));
            }
            return Err(unavailable(e));
        }

        // Holding the lock means any socket file left behind belongs to a dead daemon
        paths::remove_socket(sock_path).map_err(unavailable)?;

        Ok(Self {
            sock_path: sock_path.to_path_buf(),
            _lock: lock,
        })
    }
}

impl Drop for AddressClaim {
    fn drop(&mut self) {
        if let Err(e) = paths::remove_socket(&self.sock_path) {
            tracing::warn!("Failed to remove socket {}: {}", self.sock_path.display(), e);
        }
    }
}

/// A started daemon: address claimed, store open, listener bound
pub struct Daemon {
    identity: ServerIdentity,
    sock_path: PathBuf,
    listener: transport::Listener,
    state: Arc<ServerState>,
    shutdown: ShutdownHandle,
    // Dropped last, after the listener and the store
    claim: AddressClaim,
}

impl Daemon {
    /// Claim the address, open the store, and bind the listener
    ///
    /// Any failure here is fatal: nothing has been accepted yet.
    pub fn start(options: DaemonOptions) -> Result<Self> {
        let claim = AddressClaim::acquire(&options.sock_path)?;
        tracing::debug!(sock = %options.sock_path.display(), "Claimed socket address");

        let store = SqliteStore::open(&options.db_path)?;
        tracing::info!(db = %options.db_path.display(), "Store opened");

        Self::with_store(options, claim, Arc::new(store))
    }

    fn with_store(
        options: DaemonOptions,
        claim: AddressClaim,
        store: Arc<dyn Store>,
    ) -> Result<Self> {
        let listener = transport::create_listener(&options.sock_path).map_err(|source| {
            Error::AddressUnavailable {
                path: options.sock_path.clone(),
                source,
            }
        })?;

        let identity = ServerIdentity::current();
        let shutdown = ShutdownHandle::new();
        let state = Arc::new(ServerState {
            identity,
            store,
            shutdown: shutdown.clone(),
            client_idle_timeout: options.client_idle_timeout,
        });

        Ok(Self {
            identity,
            sock_path: options.sock_path,
            listener,
            state,
            shutdown,
            claim,
        })
    }

    /// Identity this daemon reports to clients
    pub fn identity(&self) -> ServerIdentity {
        self.identity
    }

    /// Socket path the daemon is listening on
    pub fn sock_path(&self) -> &Path {
        &self.sock_path
    }

    /// Handle that triggers a graceful shutdown from anywhere
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Serve until a shutdown is requested, then drain and clean up
    pub async fn serve(self) -> Result<()> {
        let Self {
            identity,
            sock_path,
            listener,
            state,
            shutdown: _,
            claim,
        } = self;

        tracing::info!(
            version = identity.version,
            pid = identity.pid,
            "Daemon listening on {}",
            sock_path.display()
        );

        let workers = server::accept_until_shutdown(&listener, &state).await;

        // Stop accepting before waiting on in-flight requests
        drop(listener);
        tracing::info!("Stopped accepting connections, draining {} workers", workers.len());
        server::drain(workers).await;

        tracing::info!("Cleaning up daemon resources");
        drop(state);
        drop(claim);
        tracing::info!("Daemon shutdown complete");

        Ok(())
    }

    /// Serve until SIGINT/SIGTERM (Ctrl+C on Windows) or a shutdown request
    pub async fn run(self) -> Result<()> {
        let handle = self.shutdown_handle();
        let signals = tokio::spawn(async move {
            wait_for_signal().await;
            handle.shutdown();
        });

        let result = self.serve().await;
        signals.abort();
        result
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Failed to install signal handlers: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, shutting down gracefully");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT (Ctrl+C), shutting down gracefully");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Received Ctrl+C, shutting down gracefully");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn options(dir: &Path) -> DaemonOptions {
        DaemonOptions {
            sock_path: dir.join("daemon.sock"),
            db_path: dir.join("store.db"),
            client_idle_timeout: None,
        }
    }

    #[tokio::test]
    async fn test_identity_is_current_process() {
        let tmp = tempfile::tempdir().unwrap();
        let daemon = Daemon::start(options(tmp.path())).unwrap();

        assert_eq!(daemon.identity().version, PROTOCOL_VERSION);
        assert_eq!(daemon.identity().pid, std::process::id());
        assert!(daemon.sock_path().exists());
    }

    #[tokio::test]
    async fn test_second_daemon_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let _first = Daemon::start(options(tmp.path())).unwrap();

        match Daemon::start(options(tmp.path())) {
            Err(Error::AddressInUse(path)) => assert_eq!(path, tmp.path().join("daemon.sock")),
            Err(other) => panic!("Expected AddressInUse, got {other:?}"),
            Ok(_) => panic!("Second daemon must not start"),
        }
    }

    #[tokio::test]
    async fn test_stale_socket_is_reclaimed() {
        let tmp = tempfile::tempdir().unwrap();
        let opts = options(tmp.path());
        std::fs::write(&opts.sock_path, b"left over").unwrap();

        let daemon = Daemon::start(opts).unwrap();
        assert!(daemon.sock_path().exists());
    }

    #[tokio::test]
    async fn test_store_open_failure_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut opts = options(tmp.path());
        // A directory cannot be opened as a database file
        opts.db_path = tmp.path().to_path_buf();

        let err = Daemon::start(opts.clone()).err().unwrap();
        assert!(matches!(err, Error::StoreOpen { .. }), "got {err:?}");
        assert!(!opts.sock_path.exists());
    }

    #[tokio::test]
    async fn test_shutdown_releases_address() {
        let tmp = tempfile::tempdir().unwrap();
        let daemon = Daemon::start(options(tmp.path())).unwrap();
        let handle = daemon.shutdown_handle();

        let serving = tokio::spawn(daemon.serve());
        handle.shutdown();
        serving.await.unwrap().unwrap();

        assert!(!tmp.path().join("daemon.sock").exists());
        let again = Daemon::start(options(tmp.path())).unwrap();
        drop(again);
    }
}
