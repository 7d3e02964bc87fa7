//! CLI command definitions
//!
//! Defines the clap commands for the store CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the store daemon in the foreground
    Daemon {
        /// Store database file (default: data dir)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Print the protocol version of the running daemon
    Version,

    /// Print the process id of the running daemon
    Pid,

    /// Ask the running daemon to shut down
    Shutdown,

    /// Shared variables
    #[command(subcommand)]
    Var(VarCommands),

    /// Command history
    #[command(subcommand, alias = "hist")]
    History(HistoryCommands),

    /// Directory history
    #[command(subcommand)]
    Dir(DirCommands),
}

#[derive(Subcommand)]
pub enum VarCommands {
    /// Print the value of a shared variable
    Get { name: String },

    /// Set a shared variable
    Set { name: String, value: String },

    /// Delete a shared variable
    Del { name: String },
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// Append a command to history
    Add { text: String },

    /// List history entries with FROM <= seq < UPTO
    #[command(alias = "ls")]
    List {
        /// First sequence number to include
        #[arg(long, default_value_t = 0)]
        from: u64,

        /// Stop before this sequence number (default: end of history)
        #[arg(long)]
        upto: Option<u64>,
    },

    /// Print one history entry
    Get { seq: u64 },

    /// Delete one history entry
    Del { seq: u64 },

    /// First entry at or after FROM starting with PREFIX
    Next {
        prefix: String,

        #[arg(long, default_value_t = 0)]
        from: u64,
    },

    /// Last entry before UPTO starting with PREFIX
    Prev {
        prefix: String,

        /// Search before this sequence number (default: end of history)
        #[arg(long)]
        upto: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum DirCommands {
    /// Record a visit to a directory
    Add {
        path: String,

        /// Multiplier for the score increment
        #[arg(long, default_value_t = 1.0)]
        weight: f64,
    },

    /// List directories, highest score first
    #[command(alias = "ls")]
    List {
        /// Leave out this directory (repeatable)
        #[arg(long = "exclude", short = 'x')]
        exclude: Vec<String>,
    },

    /// Forget a directory
    Del { path: String },
}
