//! IPC communication between clients and the daemon
//!
//! Uses Unix domain sockets on Unix/macOS and named pipes on Windows
//! via the interprocess crate.

pub mod client;
pub mod protocol;
pub mod transport;

pub use client::Client;
pub use protocol::{Request, Response, PROTOCOL_VERSION};
