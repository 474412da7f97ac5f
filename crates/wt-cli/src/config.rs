//! Configuration loading and data directory resolution.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Directory name of the application's data directory.
const APP_DIR: &str = "WarpTrail";

/// Data directory name used before the rename.
const LEGACY_APP_DIR: &str = "VRCTracker";

const DATABASE_FILE: &str = "WarpTrail.db";
const LEGACY_DATABASE_FILE: &str = "VRCTracker.db";

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Directory VRChat writes its log files to.
    pub log_dir: PathBuf,
    /// File name prefix identifying VRChat logs.
    pub log_file_prefix: String,
    /// Executable name of the process writing the logs.
    pub process_name: String,
    /// Delay between checks for new log data, in milliseconds.
    pub poll_interval_ms: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("log_dir", &self.log_dir)
            .field("log_file_prefix", &self.log_file_prefix)
            .field("process_name", &self.process_name)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join(DATABASE_FILE),
            log_dir: default_log_dir().unwrap_or_else(|| PathBuf::from(".")),
            log_file_prefix: "output_log".to_string(),
            process_name: "VRChat.exe".to_string(),
            poll_interval_ms: 100,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (WARPTRAIL_*)
        figment = figment.merge(Env::prefixed("WARPTRAIL_"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for warptrail.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("warptrail"))
}

/// Returns the directory that holds per-application data directories.
///
/// On Windows this is `%LOCALAPPDATA%\ticky`, elsewhere the platform data dir.
pub fn dirs_data_root() -> Option<PathBuf> {
    if cfg!(windows) {
        dirs::data_local_dir().map(|p| p.join("ticky"))
    } else {
        dirs::data_dir()
    }
}

/// Returns the platform-specific data directory for warptrail.
///
/// On Linux: `~/.local/share/WarpTrail`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs_data_root().map(|p| p.join(APP_DIR))
}

/// Returns the directory VRChat writes logs to.
///
/// On Windows: `%LOCALAPPDATA%\..\LocalLow\VRChat\VRChat`
fn default_log_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        let local = dirs::data_local_dir()?;
        Some(local.parent()?.join("LocalLow").join("VRChat").join("VRChat"))
    } else {
        dirs::data_dir().map(|p| p.join("VRChat"))
    }
}

/// Moves a legacy `VRCTracker` data directory under `root` to `WarpTrail`.
///
/// Does nothing if the new directory already exists or there is nothing to
/// migrate. Returns whether a migration happened.
pub fn migrate_legacy_data_dir(root: &Path) -> io::Result<bool> {
    let current = root.join(APP_DIR);
    let legacy = root.join(LEGACY_APP_DIR);
    if current.exists() || !legacy.is_dir() {
        return Ok(false);
    }

    fs::rename(&legacy, &current)?;
    let legacy_db = current.join(LEGACY_DATABASE_FILE);
    if legacy_db.exists() {
        fs::rename(&legacy_db, current.join(DATABASE_FILE))?;
    }
    tracing::info!(
        from = %legacy.display(),
        to = %current.display(),
        "migrated legacy data directory"
    );
    Ok(true)
}
