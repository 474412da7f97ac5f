//! Watch command: follow every new log file in the log directory.
//!
//! Each new log file gets its own follower thread with its own database
//! connection and session state. Followers end when the VRChat process they
//! were started alongside exits, or when the shared stop signal is raised.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use wt_core::{FollowOptions, StopSignal};
use wt_db::Database;

use crate::Config;
use crate::process::SystemProcess;

/// How long to wait for filesystem events before checking the stop signal.
const EVENT_TIMEOUT: Duration = Duration::from_secs(1);

/// Runs the watch command until `stop` is raised.
pub fn run(config: &Config, log_dir: &Path, stop: &StopSignal) -> Result<()> {
    if !log_dir.is_dir() {
        anyhow::bail!("log directory not found: {}", log_dir.display());
    }

    let (tx, rx) = mpsc::channel::<Event>();
    let mut watcher: RecommendedWatcher = notify::recommended_watcher(
        move |res: Result<Event, notify::Error>| match res {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(e) => tracing::warn!(error = %e, "watch error"),
        },
    )
    .context("failed to create directory watcher")?;
    watcher
        .watch(log_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", log_dir.display()))?;

    tracing::info!(dir = %log_dir.display(), "watching for new log files");

    let mut followers = Followers::default();

    while !stop.is_raised() {
        let event = match rx.recv_timeout(EVENT_TIMEOUT) {
            Ok(event) => event,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };
        if !matches!(event.kind, EventKind::Create(_)) {
            continue;
        }
        for path in event.paths {
            if is_log_file(&path, &config.log_file_prefix) {
                followers.start(path, |path| spawn_follower(config, path, stop.clone()));
            }
        }
        followers.reap();
    }

    drop(watcher);
    followers.join_all();
    Ok(())
}

/// Follower threads started by one watch run.
#[derive(Debug, Default)]
struct Followers {
    started: HashSet<PathBuf>,
    handles: Vec<JoinHandle<()>>,
}

impl Followers {
    /// Starts a follower for `path` unless one was already started.
    ///
    /// A follower that fails to start is logged and forgotten so a later
    /// event for the same file can retry it. Running followers are unaffected.
    fn start<F>(&mut self, path: PathBuf, spawn: F)
    where
        F: FnOnce(PathBuf) -> Result<JoinHandle<()>>,
    {
        if !self.started.insert(path.clone()) {
            return;
        }
        tracing::info!(path = %path.display(), "log file detected");
        match spawn(path.clone()) {
            Ok(handle) => self.handles.push(handle),
            Err(e) => {
                tracing::error!(error = ?e, path = %path.display(), "failed to start follower");
                self.started.remove(&path);
            }
        }
    }

    /// Drops handles of followers that already finished.
    fn reap(&mut self) {
        self.handles.retain(|handle| !handle.is_finished());
    }

    /// Waits for every running follower to finalize.
    fn join_all(self) {
        tracing::info!(active = self.handles.len(), "waiting for followers to finish");
        for handle in self.handles {
            if handle.join().is_err() {
                tracing::error!("follower thread panicked");
            }
        }
    }
}

/// Whether `path` names a log file (by file name prefix).
fn is_log_file(path: &Path, prefix: &str) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with(prefix))
}

/// Starts one follower thread for `path`.
///
/// Errors inside the thread end that follower only.
fn spawn_follower(config: &Config, path: PathBuf, stop: StopSignal) -> Result<JoinHandle<()>> {
    let database_path = config.database_path.clone();
    let process_name = config.process_name.clone();
    let options = FollowOptions {
        poll_interval: Duration::from_millis(config.poll_interval_ms),
        stop_at_eof: false,
    };
    let name = format!(
        "follow-{}",
        path.file_name().unwrap_or_default().to_string_lossy()
    );

    thread::Builder::new()
        .name(name)
        .spawn(move || {
            let process = SystemProcess::find_by_name(&process_name);
            match &process {
                Some(process) => tracing::info!(pid = process.pid(), "producing process detected"),
                None => tracing::warn!(
                    process = %process_name,
                    "producing process not found; following until stopped"
                ),
            }

            let db = match Database::open(&database_path) {
                Ok(db) => db,
                Err(e) => {
                    tracing::error!(error = %e, path = %database_path.display(), "failed to open database");
                    return;
                }
            };

            if let Err(e) = wt_core::follow(&path, db, process, &stop, &options) {
                tracing::error!(error = ?anyhow::Error::from(e), path = %path.display(), "follower stopped with an error");
            }
        })
        .context("failed to spawn follower thread")
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    const HOME: &str = "wrld_4432ea9b-729c-46e3-8eaf-846aa0a37fdd";

    #[test]
    fn recognises_log_files_by_prefix() {
        assert!(is_log_file(
            Path::new("/logs/output_log_2022-04-05_21-44-16.txt"),
            "output_log"
        ));
        assert!(!is_log_file(Path::new("/logs/Player.log"), "output_log"));
        assert!(!is_log_file(Path::new("/"), "output_log"));
    }

    #[test]
    fn failed_spawn_keeps_running_followers_and_allows_retry() {
        let (release, wait) = mpsc::channel::<()>();
        let finished = Arc::new(AtomicBool::new(false));
        let first = PathBuf::from("/logs/output_log_1.txt");
        let second = PathBuf::from("/logs/output_log_2.txt");
        let mut followers = Followers::default();

        {
            let finished = Arc::clone(&finished);
            followers.start(first.clone(), move |_| {
                Ok(thread::spawn(move || {
                    let _ = wait.recv();
                    finished.store(true, Ordering::SeqCst);
                }))
            });
        }
        followers.start(second.clone(), |_| anyhow::bail!("out of threads"));
        assert_eq!(followers.handles.len(), 1);
        assert!(!followers.started.contains(&second));

        followers.start(first, |_| panic!("started twice"));
        followers.start(second.clone(), |_| Ok(thread::spawn(|| {})));
        assert_eq!(followers.handles.len(), 2);
        assert!(followers.started.contains(&second));

        release.send(()).unwrap();
        followers.join_all();
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn missing_log_dir_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("WarpTrail.db"),
            log_dir: temp.path().join("missing"),
            log_file_prefix: "output_log".to_string(),
            process_name: "warptrail-no-such-process.exe".to_string(),
            poll_interval_ms: 10,
        };
        let err = run(&config, &config.log_dir, &StopSignal::new()).unwrap_err();
        assert!(err.to_string().contains("log directory not found"));
    }

    #[test]
    fn follows_new_log_files_until_stopped() {
        let temp = tempfile::tempdir().unwrap();
        let log_dir = temp.path().join("logs");
        fs::create_dir_all(&log_dir).unwrap();
        let config = Config {
            database_path: temp.path().join("WarpTrail.db"),
            log_dir: log_dir.clone(),
            log_file_prefix: "output_log".to_string(),
            process_name: "warptrail-no-such-process.exe".to_string(),
            poll_interval_ms: 10,
        };

        let stop = StopSignal::new();
        let handle = {
            let config = config.clone();
            let stop = stop.clone();
            thread::spawn(move || run(&config, &config.log_dir, &stop))
        };

        // Give the watcher time to register before creating files.
        thread::sleep(Duration::from_millis(500));
        fs::write(log_dir.join("ignored.txt"), "noise\n").unwrap();
        fs::write(
            log_dir.join("output_log_1.txt"),
            format!("2022.04.05 23:02:13 Log        -  [Behaviour] Joining {HOME}:1~private\n"),
        )
        .unwrap();

        let db_has_checkin = || {
            Database::open(&config.database_path)
                .and_then(|db| db.counts())
                .is_ok_and(|counts| counts.checkins == 1)
        };
        for _ in 0..100 {
            if db_has_checkin() {
                break;
            }
            thread::sleep(Duration::from_millis(50));
        }

        stop.raise();
        handle.join().unwrap().unwrap();

        let db = Database::open(&config.database_path).unwrap();
        let history = db.list_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].place_id, HOME);
        assert!(history[0].end.is_some(), "stop signal finalizes the check-in");
    }
}
