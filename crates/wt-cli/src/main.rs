use std::io::stdout;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wt_cli::commands::{export, follow, status, watch};
use wt_cli::{Cli, Commands, Config};
use wt_core::StopSignal;

/// Migrate legacy data, then load config and make sure the database directory exists.
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    if let Some(root) = wt_cli::dirs_data_root() {
        wt_cli::migrate_legacy_data_dir(&root).context("failed to migrate legacy data directory")?;
    }

    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Ok(config)
}

/// Raises the returned signal on Ctrl-C.
fn stop_on_ctrl_c() -> Result<StopSignal> {
    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received; stopping");
        handler_stop.raise();
    })
    .context("failed to install Ctrl-C handler")?;
    Ok(stop)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match &cli.command {
        Some(Commands::Watch { log_dir }) => {
            let config = load_config(cli.config.as_deref())?;
            let stop = stop_on_ctrl_c()?;
            let log_dir = log_dir.as_deref().unwrap_or(config.log_dir.as_path());
            watch::run(&config, log_dir, &stop)?;
        }
        Some(Commands::Follow { path, pid, no_wait }) => {
            let config = load_config(cli.config.as_deref())?;
            let stop = stop_on_ctrl_c()?;
            follow::run(&mut stdout().lock(), &config, path, *pid, *no_wait, &stop)?;
        }
        Some(Commands::Export {
            output,
            format,
            title,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let db = wt_db::Database::open(&config.database_path)
                .context("failed to open database")?;
            export::run(&mut stdout().lock(), &db, output, format.as_deref(), title)?;
        }
        Some(Commands::Status) => {
            let config = load_config(cli.config.as_deref())?;
            status::run(&mut stdout().lock(), &config)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
