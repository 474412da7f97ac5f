//! CLI subcommand implementations.

pub mod export;
pub mod follow;
pub mod status;
pub mod watch;
