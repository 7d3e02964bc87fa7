//! Request handler for processing IPC requests
//!
//! Identity and shutdown requests are answered directly; everything else is
//! a store operation, run on the blocking pool because the store is
//! synchronous.

use std::sync::Arc;

use crate::common::{Error, Result};
use crate::ipc::protocol::{Request, Response};
use crate::store::Store;

use super::server::ServerState;

/// Handle an IPC request, mapping any failure into an error response
pub(super) async fn handle_request(state: &ServerState, request: Request) -> Response {
    let op = request.op();

    match handle_request_inner(state, request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(op, "Request failed: {}", e);
            Response::error(&e)
        }
    }
}

async fn handle_request_inner(state: &ServerState, request: Request) -> Result<Response> {
    match request {
        // === Server state ===
        Request::Version => Response::success(&state.identity.version),

        Request::Pid => Response::success(&state.identity.pid),

        Request::Shutdown => {
            tracing::info!("Shutdown requested by client");
            state.shutdown.shutdown();
            Ok(Response::ack())
        }

        // === Store operations ===
        request => {
            let store = Arc::clone(&state.store);
            tokio::task::spawn_blocking(move || handle_store_request(store.as_ref(), request))
                .await
                .map_err(|e| Error::Internal(format!("store task failed: {e}")))?
        }
    }
}

fn handle_store_request(store: &dyn Store, request: Request) -> Result<Response> {
    match request {
        // === Shared variables ===
        Request::SharedVar { name } => Response::success(&store.shared_var(&name)?),

        Request::SetSharedVar { name, value } => {
            store.set_shared_var(&name, &value)?;
            Ok(Response::ack())
        }

        Request::DelSharedVar { name } => {
            store.del_shared_var(&name)?;
            Ok(Response::ack())
        }

        // === Command history ===
        Request::NextCmdSeq => Response::success(&store.next_cmd_seq()?),

        Request::AddCmd { text } => Response::success(&store.add_cmd(&text)?),

        Request::DelCmd { seq } => {
            store.del_cmd(seq)?;
            Ok(Response::ack())
        }

        Request::Cmd { seq } => Response::success(&store.cmd(seq)?),

        Request::Cmds { from, upto } => Response::success(&store.cmds(from, upto)?),

        Request::NextCmd { from, prefix } => Response::success(&store.next_cmd(from, &prefix)?),

        Request::PrevCmd { upto, prefix } => Response::success(&store.prev_cmd(upto, &prefix)?),

        // === Directory history ===
        Request::AddDir { path, inc_factor } => {
            if !inc_factor.is_finite() {
                return Err(Error::InvalidQuery(format!(
                    "directory weight must be finite, got {inc_factor}"
                )));
            }
            store.add_dir(&path, inc_factor)?;
            Ok(Response::ack())
        }

        Request::DelDir { path } => {
            store.del_dir(&path)?;
            Ok(Response::ack())
        }

        Request::Dirs { blacklist } => Response::success(&store.dirs(&blacklist)?),

        Request::Version | Request::Pid | Request::Shutdown => Err(Error::Internal(format!(
            "'{}' is not a store operation",
            request.op()
        ))),
    }
}
