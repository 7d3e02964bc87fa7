//! Daemon server - IPC accept loop and per-connection workers

use std::sync::Arc;
use std::time::Duration;

use interprocess::local_socket::traits::tokio::Listener as ListenerTrait;
use tokio::io::BufReader;
use tokio::task::JoinSet;

use crate::common::{Error, Result};
use crate::ipc::{
    protocol::{self, Response},
    transport,
};
use crate::store::Store;

use super::handler;
use super::lifecycle::{ServerIdentity, ShutdownHandle};

/// Everything a connection worker needs, shared by all of them
pub(super) struct ServerState {
    pub identity: ServerIdentity,
    pub store: Arc<dyn Store>,
    pub shutdown: ShutdownHandle,
    pub client_idle_timeout: Option<Duration>,
}

/// Accept connections until a shutdown is requested
///
/// Each connection gets its own task; the returned set still holds the ones
/// that have not finished.
pub(super) async fn accept_until_shutdown(
    listener: &transport::Listener,
    state: &Arc<ServerState>,
) -> JoinSet<()> {
    let mut shutdown = state.shutdown.subscribe();
    let mut workers = JoinSet::new();
    let mut next_conn_id: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => {
                tracing::info!("Shutdown requested, no longer accepting connections");
                break;
            }
            accept_result = listener.accept() => {
                match accept_result {
                    Ok(stream) => {
                        next_conn_id += 1;
                        tracing::debug!(conn = next_conn_id, "Accepted connection");
                        workers.spawn(handle_client(next_conn_id, stream, Arc::clone(state)));
                    }
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                    }
                }
            }
            Some(joined) = workers.join_next(), if !workers.is_empty() => {
                log_worker_exit(joined);
            }
        }
    }

    workers
}

/// Wait for every remaining connection worker
pub(super) async fn drain(mut workers: JoinSet<()>) {
    while let Some(joined) = workers.join_next().await {
        log_worker_exit(joined);
    }
}

fn log_worker_exit(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!("Connection worker failed: {}", e);
    }
}

/// Resolves once a connection has been idle for `timeout`, never when unset
async fn idle_expired(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

/// Serve one connection: read a request, answer it, repeat
///
/// Ends on disconnect, framing error, shutdown, or the idle timeout when one
/// is configured. A shutdown only interrupts the wait for the next request,
/// never a request that is already being processed.
async fn handle_client(conn_id: u64, stream: transport::Stream, state: Arc<ServerState>) {
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut shutdown = state.shutdown.subscribe();

    loop {
        let request_data = tokio::select! {
            result = transport::recv_message(&mut reader) => {
                match result {
                    Ok(data) => data,
                    Err(e) if transport::is_disconnect(&e) => {
                        tracing::debug!(conn = conn_id, "Client disconnected");
                        break;
                    }
                    Err(e) => {
                        // Framing can't be trusted anymore
                        tracing::warn!(conn = conn_id, "Error reading request: {}", e);
                        break;
                    }
                }
            }
            _ = shutdown.wait_for(|stop| *stop) => {
                tracing::debug!(conn = conn_id, "Closing connection for shutdown");
                break;
            }
            _ = idle_expired(state.client_idle_timeout) => {
                tracing::debug!(conn = conn_id, "Client timeout");
                break;
            }
        };

        let response = match protocol::decode_request(&request_data) {
            Ok(request) => {
                tracing::debug!(conn = conn_id, op = request.op(), "Received request");
                handler::handle_request(&state, request).await
            }
            Err(e) => {
                tracing::warn!(conn = conn_id, "Invalid request: {}", e);
                Response::error(&e)
            }
        };

        let json = match encode_within_limit(&response) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(conn = conn_id, "Failed to encode response: {}", e);
                break;
            }
        };

        if let Err(e) = transport::send_message(&mut writer, &json).await {
            tracing::debug!(conn = conn_id, "Failed to send response: {}", e);
            break;
        }
    }
}

/// Encode a response, replacing it with an error when it would not fit in a frame
///
/// An oversized result is the query's fault, so the client gets an
/// `InvalidQuery` it can act on and the connection stays usable.
fn encode_within_limit(response: &Response) -> Result<Vec<u8>> {
    let json = protocol::encode_response(response)?;
    if json.len() <= transport::MAX_MESSAGE_SIZE as usize {
        return Ok(json);
    }

    tracing::warn!(size = json.len(), "Response exceeds message limit");
    let error = Error::InvalidQuery(format!(
        "result is {} bytes, over the {} byte message limit; narrow the range",
        json.len(),
        transport::MAX_MESSAGE_SIZE
    ));
    protocol::encode_response(&Response::error(&error))
}
