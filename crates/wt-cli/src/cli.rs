//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wt_core::export::DEFAULT_TITLE;

/// Location history tracker for VRChat.
///
/// Follows VRChat's output logs and records which worlds you visited, when,
/// and who else was there.
#[derive(Debug, Parser)]
#[command(name = "warptrail", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Watch the log directory and follow every new log file.
    Watch {
        /// Directory to watch (defaults to VRChat's log directory).
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },

    /// Follow a single log file.
    Follow {
        /// The log file to read.
        path: PathBuf,

        /// Stop once this process exits.
        #[arg(long)]
        pid: Option<u32>,

        /// Stop at the current end of the file instead of waiting for more.
        #[arg(long)]
        no_wait: bool,
    },

    /// Export location history.
    Export {
        /// Output file, or `-` for stdout.
        output: PathBuf,

        /// Output format: md, txt or json (defaults to the file extension).
        #[arg(long)]
        format: Option<String>,

        /// Title used in the Markdown heading.
        #[arg(long, default_value = DEFAULT_TITLE)]
        title: String,
    },

    /// Show stored history totals and open check-ins.
    Status,
}
