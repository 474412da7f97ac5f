//! Core domain logic for WarpTrail.
//!
//! This crate contains the fundamental types and logic for:
//! - Classification: turning raw VRChat log lines into typed events
//! - Session tracking: deriving occupancy and presence intervals from events
//! - Following: tailing a live log file until its session ends
//! - Export: rendering stored history as Markdown, plain text or JSON

mod classify;
pub mod export;
pub mod follow;
mod place;
mod tracker;

pub use classify::{LogEvent, classify_line, classify_line_in};
pub use export::{ExportError, ExportFormat, HistoryEntry};
pub use follow::{FollowError, FollowOptions, FollowSummary, ProcessHandle, StopSignal, follow};
pub use place::{PlaceId, PlaceIdError};
pub use tracker::{SessionStore, SessionTracker};
