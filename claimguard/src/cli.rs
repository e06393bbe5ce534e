//! CLI argument definitions using clap derive macros.
//!
//! Each invocation plays the part of one host process: in-memory session
//! state starts fresh, the file store carries the background marker across
//! invocations. A marker written by an earlier invocation counts as the first
//! background capture, so a later `event background` keeps it.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use claimguard_core::AppState;

/// Claims client session lifecycle host
///
/// Drives the session lifecycle manager against a file-backed store.
#[derive(Parser, Debug)]
#[command(name = "claimguard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Default, Clone)]
pub struct GlobalArgs {
    /// Session timeout in seconds (overrides config)
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to the key-value store file (overrides config)
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Pin "now" to an epoch-millisecond instant instead of the wall clock
    #[arg(long, global = true, value_name = "EPOCH_MS", allow_hyphen_values = true)]
    pub at: Option<i64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the process-start session check
    Start,

    /// Deliver a single lifecycle transition
    Event {
        /// New application state
        #[arg(value_enum)]
        state: StateArg,
    },

    /// Subscribe to transitions read line by line from stdin
    ///
    /// Lines: active | background | inactive | timeout <secs> | quit
    Watch,

    /// Purge session data and request the login route
    Logout,

    /// Show timeout, background marker and stored session keys
    Status {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Inspect or seed the key-value store
    Store(StoreCommand),

    /// Show version
    Version,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum StateArg {
    Active,
    Background,
    Inactive,
}

impl From<StateArg> for AppState {
    fn from(arg: StateArg) -> Self {
        match arg {
            StateArg::Active => AppState::Active,
            StateArg::Background => AppState::Background,
            StateArg::Inactive => AppState::Inactive,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct StoreCommand {
    #[command(subcommand)]
    pub action: StoreAction,
}

#[derive(Subcommand, Debug)]
pub enum StoreAction {
    /// Read a value
    Get { key: String },

    /// Write a value
    Set { key: String, value: String },

    /// Delete a key
    Delete { key: String },

    /// List all entries
    List,
}
