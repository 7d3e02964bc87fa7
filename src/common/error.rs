//! Error types for the store daemon and its clients
//!
//! Transport failures, application failures reported by the store, and fatal
//! startup failures are distinct variants so callers can decide which ones
//! are worth retrying.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the daemon and client
#[derive(Error, Debug)]
pub enum Error {
    // === Transport Errors ===
    #[error("Connection refused: no daemon is listening at {}", .0.display())]
    ConnectionRefused(PathBuf),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Unknown operation '{0}'. Client and daemon may be running different versions")]
    UnknownOperation(String),

    #[error("Could not connect to daemon at {} after {attempts} attempts: {last}", .path.display())]
    CouldNotConnect {
        path: PathBuf,
        attempts: u32,
        last: Box<Error>,
    },

    #[error("Daemon speaks protocol {server}, this client speaks {client}. Restart the daemon")]
    IncompatibleServer { client: u32, server: u32 },

    // === Application Errors ===
    #[error("No such shared variable: {0}")]
    NoSuchVariable(String),

    #[error("No matching command in history")]
    NoMatchingCommand,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Store error: {0}")]
    Store(String),

    // === Startup Errors ===
    #[error("Address {} is in use by another live daemon", .0.display())]
    AddressInUse(PathBuf),

    #[error("Address {} is unavailable: {source}", .path.display())]
    AddressUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to open store at {}: {message}", .path.display())]
    StoreOpen { path: PathBuf, message: String },

    // === Configuration Errors ===
    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a caller's connect loop should try again after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionRefused(_) | Self::ConnectionClosed)
    }

    /// Whether the failure was reported by the store rather than the transport
    pub fn is_application(&self) -> bool {
        matches!(
            self,
            Self::NoSuchVariable(_)
                | Self::NoMatchingCommand
                | Self::InvalidQuery(_)
                | Self::Store(_)
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<r2d2::Error> for Error {
    fn from(e: r2d2::Error) -> Self {
        Self::Store(format!("no store connection available: {e}"))
    }
}

/// Failure category carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoSuchVariable,
    NoMatchingCommand,
    InvalidQuery,
    MalformedMessage,
    UnknownOperation,
    Store,
    /// Also covers kinds introduced by a newer daemon
    #[serde(other)]
    Internal,
}

/// IPC-serializable error for daemon responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for RpcError {
    fn from(e: &Error) -> Self {
        let (kind, message) = match e {
            Error::NoSuchVariable(name) => (ErrorKind::NoSuchVariable, name.clone()),
            Error::NoMatchingCommand => (ErrorKind::NoMatchingCommand, e.to_string()),
            Error::InvalidQuery(msg) => (ErrorKind::InvalidQuery, msg.clone()),
            Error::MalformedMessage(msg) => (ErrorKind::MalformedMessage, msg.clone()),
            Error::UnknownOperation(op) => (ErrorKind::UnknownOperation, op.clone()),
            Error::Store(msg) => (ErrorKind::Store, msg.clone()),
            _ => (ErrorKind::Internal, e.to_string()),
        };

        Self { kind, message }
    }
}

impl From<RpcError> for Error {
    fn from(e: RpcError) -> Self {
        match e.kind {
            ErrorKind::NoSuchVariable => Error::NoSuchVariable(e.message),
            ErrorKind::NoMatchingCommand => Error::NoMatchingCommand,
            ErrorKind::InvalidQuery => Error::InvalidQuery(e.message),
            ErrorKind::MalformedMessage => Error::MalformedMessage(e.message),
            ErrorKind::UnknownOperation => Error::UnknownOperation(e.message),
            ErrorKind::Store => Error::Store(e.message),
            ErrorKind::Internal => Error::Internal(e.message),
        }
    }
}
