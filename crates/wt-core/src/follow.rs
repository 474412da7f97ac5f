//! Tailing a live log file and feeding its lines through a session tracker.
//!
//! A follower reads appended lines until its session ends: the stop signal is
//! raised, or the process writing the log is no longer running. When no new
//! data is available it waits on the stop signal for one poll interval, so a
//! raised signal wakes it immediately instead of after a full sleep.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, Offset};
use thiserror::Error;

use crate::{SessionStore, SessionTracker, classify_line};

/// Default delay between checks for new data.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Liveness check for the process producing a log file.
pub trait ProcessHandle {
    fn is_running(&mut self) -> bool;
}

/// Cooperative stop flag shared between a watcher and its followers.
///
/// Cloning is cheap; every clone observes the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal and wakes every waiting follower.
    pub fn raise(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_raised(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits up to `timeout` for the signal. Returns whether it is raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |raised| !*raised)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Tuning for a single follower.
#[derive(Debug, Clone)]
pub struct FollowOptions {
    /// How long to wait at end-of-file before checking again.
    pub poll_interval: Duration,
    /// Treat the first end-of-file as the end of the session.
    pub stop_at_eof: bool,
}

impl Default for FollowOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            stop_at_eof: false,
        }
    }
}

/// Counters reported when a follower finishes cleanly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowSummary {
    pub lines: u64,
    pub events: u64,
}

/// Fatal follower errors. Either one ends only the task that hit it.
#[derive(Debug, Error)]
pub enum FollowError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to record session event")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Why the read loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Signal,
    ProcessExited,
    EndOfFile,
}

/// Follows `path` until the session ends, then closes open intervals.
///
/// Events are applied to `store` one line at a time, in file order. With no
/// `process`, only the stop signal (or `stop_at_eof`) ends the session.
pub fn follow<S, P>(
    path: &Path,
    store: S,
    mut process: Option<P>,
    stop: &StopSignal,
    options: &FollowOptions,
) -> Result<FollowSummary, FollowError>
where
    S: SessionStore,
    P: ProcessHandle,
{
    let io_err = |source| FollowError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let mut reader = BufReader::new(file);
    let mut tracker = SessionTracker::new(store);
    let mut summary = FollowSummary::default();
    let mut pending = Vec::new();
    let mut draining = false;

    tracing::info!(path = %path.display(), "following log file");

    let reason = loop {
        if stop.is_raised() {
            break StopReason::Signal;
        }

        let read = reader.read_until(b'\n', &mut pending).map_err(io_err)?;
        if read > 0 && pending.ends_with(b"\n") {
            process_line(&mut tracker, &pending, &mut summary)?;
            pending.clear();
            continue;
        }

        // End of the data written so far.
        if draining {
            break StopReason::ProcessExited;
        }
        if options.stop_at_eof {
            break StopReason::EndOfFile;
        }
        if let Some(process) = process.as_mut() {
            if !process.is_running() {
                // Pick up anything written between the last read and the exit.
                draining = true;
                continue;
            }
        }
        if stop.wait_timeout(options.poll_interval) {
            break StopReason::Signal;
        }
    };

    if !pending.is_empty() {
        process_line(&mut tracker, &pending, &mut summary)?;
    }

    tracker
        .finalize(local_now())
        .map_err(|e| FollowError::Store(Box::new(e)))?;

    tracing::info!(
        path = %path.display(),
        ?reason,
        lines = summary.lines,
        events = summary.events,
        "stopped processing log file"
    );
    Ok(summary)
}

fn process_line<S: SessionStore>(
    tracker: &mut SessionTracker<S>,
    raw: &[u8],
    summary: &mut FollowSummary,
) -> Result<(), FollowError> {
    let line = String::from_utf8_lossy(raw);
    summary.lines += 1;
    for event in classify_line(&line) {
        tracing::trace!(kind = event.kind(), "classified line");
        tracker
            .apply(&event)
            .map_err(|e| FollowError::Store(Box::new(e)))?;
        summary.events += 1;
    }
    Ok(())
}

fn local_now() -> DateTime<FixedOffset> {
    let now = Local::now();
    now.with_timezone(&now.offset().fix())
}
