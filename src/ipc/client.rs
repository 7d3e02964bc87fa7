//! Client-side IPC for talking to the store daemon
//!
//! A [`Client`] holds at most one connection. It connects lazily on the first
//! call and never retries on its own: when the daemon may still be starting,
//! the caller loops over [`Client::reset_conn`] with its own delay and
//! attempt budget.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tokio::io::{ReadHalf, WriteHalf};

use crate::common::{Error, Result};
use crate::store::{Cmd, Dir};

use super::protocol::{self, Request, PROTOCOL_VERSION};
use super::transport::{self, Stream};

/// One open connection to the daemon
struct Connection {
    reader: ReadHalf<Stream>,
    writer: WriteHalf<Stream>,
}

async fn open(sock_path: &Path) -> Result<Connection> {
    let stream = transport::connect(sock_path).await.map_err(|e| {
        if transport::is_refused(&e) {
            Error::ConnectionRefused(sock_path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;

    let (reader, writer) = tokio::io::split(stream);
    Ok(Connection { reader, writer })
}

/// Client for communicating with the store daemon
pub struct Client {
    sock_path: PathBuf,
    conn: Option<Connection>,
}

impl Client {
    /// Create a client for the daemon at `sock_path` without connecting yet
    pub fn new(sock_path: impl Into<PathBuf>) -> Self {
        Self {
            sock_path: sock_path.into(),
            conn: None,
        }
    }

    /// Socket path this client talks to
    pub fn sock_path(&self) -> &Path {
        &self.sock_path
    }

    /// Whether a connection is currently open
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Drop any existing connection and make one attempt to open a new one
    pub async fn reset_conn(&mut self) -> Result<()> {
        self.conn = None;
        self.conn = Some(open(&self.sock_path).await?);
        Ok(())
    }

    /// Release the connection, if any
    pub fn close(&mut self) {
        if self.conn.take().is_some() {
            tracing::debug!(sock = %self.sock_path.display(), "Closed daemon connection");
        }
    }

    /// Send one request and wait for its response
    ///
    /// Any transport failure discards the connection; the next call opens a
    /// fresh one. The failed request itself is not resent. A call that is
    /// cancelled midway also leaves the client disconnected, so a late
    /// response can never be read as the answer to a later request.
    pub async fn call<T: DeserializeOwned>(&mut self, request: Request) -> Result<T> {
        let body = protocol::encode_request(&request)?;
        if body.len() > transport::MAX_MESSAGE_SIZE as usize {
            return Err(Error::InvalidQuery(format!(
                "request is {} bytes, over the {} byte message limit",
                body.len(),
                transport::MAX_MESSAGE_SIZE
            )));
        }

        // Only put back once a whole response has been read
        let mut conn = match self.conn.take() {
            Some(conn) => conn,
            None => open(&self.sock_path).await?,
        };

        let exchange = async {
            transport::send_message(&mut conn.writer, &body).await?;
            transport::recv_message(&mut conn.reader).await
        };

        let reply = exchange.await.map_err(|e| {
            if transport::is_disconnect(&e) {
                Error::ConnectionClosed
            } else if e.kind() == std::io::ErrorKind::InvalidData {
                Error::MalformedMessage(e.to_string())
            } else {
                Error::Io(e)
            }
        })?;

        // Framing is intact but the peer may not be speaking our protocol
        let response = protocol::decode_response(&reply)?;
        self.conn = Some(conn);

        response.into_result()
    }

    // === Server state ===

    /// Protocol version the daemon speaks
    pub async fn version(&mut self) -> Result<u32> {
        self.call(Request::Version).await
    }

    /// Process id of the daemon
    pub async fn pid(&mut self) -> Result<u32> {
        self.call(Request::Pid).await
    }

    /// Ask the daemon to shut down
    pub async fn shutdown(&mut self) -> Result<()> {
        self.call(Request::Shutdown).await
    }

    /// Fail with `IncompatibleServer` if the daemon speaks another protocol version
    pub async fn check_compatible(&mut self) -> Result<()> {
        let server = self.version().await?;
        if server != PROTOCOL_VERSION {
            return Err(Error::IncompatibleServer {
                client: PROTOCOL_VERSION,
                server,
            });
        }
        Ok(())
    }

    // === Shared variables ===

    pub async fn shared_var(&mut self, name: &str) -> Result<String> {
        self.call(Request::SharedVar {
            name: name.to_string(),
        })
        .await
    }

    pub async fn set_shared_var(&mut self, name: &str, value: &str) -> Result<()> {
        self.call(Request::SetSharedVar {
            name: name.to_string(),
            value: value.to_string(),
        })
        .await
    }

    pub async fn del_shared_var(&mut self, name: &str) -> Result<()> {
        self.call(Request::DelSharedVar {
            name: name.to_string(),
        })
        .await
    }

    // === Command history ===

    pub async fn next_cmd_seq(&mut self) -> Result<u64> {
        self.call(Request::NextCmdSeq).await
    }

    /// Append a command to history, returning its sequence number
    pub async fn add_cmd(&mut self, text: &str) -> Result<u64> {
        self.call(Request::AddCmd {
            text: text.to_string(),
        })
        .await
    }

    pub async fn del_cmd(&mut self, seq: u64) -> Result<()> {
        self.call(Request::DelCmd { seq }).await
    }

    pub async fn cmd(&mut self, seq: u64) -> Result<String> {
        self.call(Request::Cmd { seq }).await
    }

    /// Commands with `from <= seq < upto`, oldest first
    pub async fn cmds(&mut self, from: u64, upto: u64) -> Result<Vec<Cmd>> {
        self.call(Request::Cmds { from, upto }).await
    }

    pub async fn next_cmd(&mut self, from: u64, prefix: &str) -> Result<Cmd> {
        self.call(Request::NextCmd {
            from,
            prefix: prefix.to_string(),
        })
        .await
    }

    pub async fn prev_cmd(&mut self, upto: u64, prefix: &str) -> Result<Cmd> {
        self.call(Request::PrevCmd {
            upto,
            prefix: prefix.to_string(),
        })
        .await
    }

    // === Directory history ===

    pub async fn add_dir(&mut self, path: &str, inc_factor: f64) -> Result<()> {
        self.call(Request::AddDir {
            path: path.to_string(),
            inc_factor,
        })
        .await
    }

    pub async fn del_dir(&mut self, path: &str) -> Result<()> {
        self.call(Request::DelDir {
            path: path.to_string(),
        })
        .await
    }

    /// Directories not in `blacklist`, highest score first
    pub async fn dirs(&mut self, blacklist: &[String]) -> Result<Vec<Dir>> {
        self.call(Request::Dirs {
            blacklist: blacklist.to_vec(),
        })
        .await
    }
}
