//! Store adapter
//!
//! A synchronous facade over the persistent store. Every operation is atomic
//! with respect to concurrent callers; implementations bring their own
//! synchronization, so the daemon can share one store across all connection
//! workers as an `Arc<dyn Store>`.

mod sqlite;

use serde::{Deserialize, Serialize};

use crate::common::Result;

pub use sqlite::SqliteStore;

/// Multiplier applied to every directory score when any directory is added
pub const DIR_SCORE_DECAY: f64 = 0.986; // roughly 0.5^(1/50)

/// Base score added to a directory each time it is visited
pub const DIR_SCORE_INCREMENT: f64 = 10.0;

/// A command history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cmd {
    pub seq: u64,
    pub text: String,
}

/// A directory history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dir {
    pub path: String,
    pub score: f64,
}

/// Operations the daemon protocol needs from the persistent store
pub trait Store: Send + Sync {
    // === Shared variables ===

    /// Value of a shared variable; `NoSuchVariable` if unset
    fn shared_var(&self, name: &str) -> Result<String>;

    /// Set a shared variable, overwriting any previous value
    fn set_shared_var(&self, name: &str, value: &str) -> Result<()>;

    /// Delete a shared variable; deleting an unset variable is not an error
    fn del_shared_var(&self, name: &str) -> Result<()>;

    // === Command history ===

    /// Sequence number the next added command will receive
    fn next_cmd_seq(&self) -> Result<u64>;

    /// Append a command, returning its sequence number
    fn add_cmd(&self, text: &str) -> Result<u64>;

    /// Delete a command by sequence number
    fn del_cmd(&self, seq: u64) -> Result<()>;

    /// Text of the command with the given sequence number
    fn cmd(&self, seq: u64) -> Result<String>;

    /// Commands with `from <= seq < upto`, oldest first
    fn cmds(&self, from: u64, upto: u64) -> Result<Vec<Cmd>>;

    /// First command with `seq >= from` starting with `prefix`
    fn next_cmd(&self, from: u64, prefix: &str) -> Result<Cmd>;

    /// Last command with `seq < upto` starting with `prefix`
    fn prev_cmd(&self, upto: u64, prefix: &str) -> Result<Cmd>;

    // === Directory history ===

    /// Record a visit to `path`, decaying every other score first
    fn add_dir(&self, path: &str, inc_factor: f64) -> Result<()>;

    /// Forget a directory
    fn del_dir(&self, path: &str) -> Result<()>;

    /// Directories not in `blacklist`, highest score first
    fn dirs(&self, blacklist: &[String]) -> Result<Vec<Dir>>;
}
