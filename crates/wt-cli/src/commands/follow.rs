//! Follow command for reading a single log file.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use wt_core::{FollowOptions, StopSignal};
use wt_db::Database;

use crate::Config;
use crate::process::SystemProcess;

/// Runs the follow command.
///
/// With a pid the session ends when that process exits; with `no_wait` it
/// ends at the current end of the file; otherwise it runs until `stop`.
pub fn run<W: Write>(
    writer: &mut W,
    config: &Config,
    path: &Path,
    pid: Option<u32>,
    no_wait: bool,
    stop: &StopSignal,
) -> Result<()> {
    let process = match pid {
        Some(pid) => Some(
            SystemProcess::from_pid(pid)
                .with_context(|| format!("process {pid} is not running"))?,
        ),
        None => None,
    };

    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let options = FollowOptions {
        poll_interval: Duration::from_millis(config.poll_interval_ms),
        stop_at_eof: no_wait,
    };

    let summary = wt_core::follow(path, db, process, stop, &options)
        .with_context(|| format!("failed to follow {}", path.display()))?;

    writeln!(
        writer,
        "Processed {} lines ({} events) from {}",
        summary.lines,
        summary.events,
        path.display()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = "wrld_4432ea9b-729c-46e3-8eaf-846aa0a37fdd";
    const RAIN: &str = "wrld_56b348fc-b1cb-4242-8587-9eb8e01ef399";

    fn test_config(temp: &Path) -> Config {
        Config {
            database_path: temp.join("WarpTrail.db"),
            log_dir: temp.to_path_buf(),
            log_file_prefix: "output_log".to_string(),
            process_name: "VRChat.exe".to_string(),
            poll_interval_ms: 10,
        }
    }

    #[test]
    fn no_wait_imports_a_finished_log() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let log = temp.path().join("output_log_2022-04-15.txt");
        std::fs::write(
            &log,
            format!(
                "2022.04.15 16:09:26 Log        -  [Behaviour] Joining {RAIN}:1~private\n\
                 2022.04.15 16:09:26 Log        -  [Behaviour] Joining or Creating Room: Just Rain\n\
                 2022.04.15 16:09:30 Log        -  [Behaviour] OnPlayerJoined Alice\n\
                 2022.04.15 16:10:35 Log        -  [Behaviour] Joining {HOME}:2~private\n\
                 2022.04.15 16:10:35 Log        -  [Behaviour] Joining or Creating Room: VRChat Home\n"
            ),
        )
        .unwrap();

        let mut output = Vec::new();
        run(&mut output, &config, &log, None, true, &StopSignal::new()).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Processed 5 lines (5 events)"), "{output}");

        let db = Database::open(&config.database_path).unwrap();
        let history = db.list_history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].place_name.as_deref(), Some("Just Rain"));
        assert_eq!(history[1].place_name.as_deref(), Some("VRChat Home"));
        assert_eq!(history[0].end, history[1].start);
        assert!(history[1].end.is_some(), "finalization closes the last check-in");

        let visitors = db.list_visitors(RAIN).unwrap();
        assert_eq!(visitors.len(), 1);
        assert_eq!(visitors[0].end, history[1].start);
    }

    #[test]
    fn unknown_pid_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let log = temp.path().join("output_log.txt");
        std::fs::write(&log, "").unwrap();

        let err = run(
            &mut Vec::new(),
            &config,
            &log,
            Some(u32::MAX),
            false,
            &StopSignal::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("is not running"), "{err}");
    }
}
