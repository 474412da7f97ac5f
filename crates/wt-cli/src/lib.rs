//! WarpTrail CLI library.
//!
//! This crate provides the command-line interface: configuration, process
//! discovery, the log directory watcher and the subcommands.

mod cli;
pub mod commands;
mod config;
pub mod process;

pub use cli::{Cli, Commands};
pub use config::{Config, dirs_data_root, migrate_legacy_data_dir};
