//! shstore - persistent shell storage behind a local daemon
//!
//! A long-lived daemon owns the store (command history, directory history,
//! shared variables) and serves it to short-lived shell clients over a Unix
//! domain socket (named pipe on Windows).

pub mod cli;
pub mod commands;
pub mod common;
pub mod daemon;
pub mod ipc;
pub mod store;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use ipc::{Client, Request, Response, PROTOCOL_VERSION};
