//! Rendering stored location history for export.
//!
//! Formatting is pure: callers query the history (in insertion order) and
//! hand it over as [`HistoryEntry`] rows.

use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;

use crate::place::place_url;

/// Title used in the Markdown heading unless overridden.
pub const DEFAULT_TITLE: &str = "WarpTrail";

/// Display layout for timestamps in Markdown and plain text.
const DISPLAY_FORMAT: &str = "%d/%m/%Y, %H:%M";

/// Placeholder for a missing timestamp.
const UNKNOWN: &str = "(unknown)";

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The requested output format is not one we can produce.
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),
    /// A stored timestamp could not be parsed for display.
    #[error("invalid stored timestamp: {value}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("failed to serialize history")]
    Json(#[from] serde_json::Error),
}

/// One occupancy interval joined to its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub place_id: String,
    pub place_name: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl HistoryEntry {
    /// Name if known, otherwise the raw id.
    fn label(&self) -> &str {
        self.place_name.as_deref().unwrap_or(&self.place_id)
    }
}

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Markdown,
    Text,
    Json,
}

impl ExportFormat {
    /// Picks the format from a file extension (`.md`, `.txt`, `.json`).
    ///
    /// A path without an extension is reported as format `none`.
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        match path.extension() {
            Some(ext) => ext.to_string_lossy().parse(),
            None => Err(ExportError::UnsupportedFormat("none".to_string())),
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Text => "txt",
            Self::Json => "json",
        }
    }

    /// Renders the history in this format.
    pub fn render(self, title: &str, entries: &[HistoryEntry]) -> Result<String, ExportError> {
        match self {
            Self::Markdown => render_markdown(title, entries),
            Self::Text => render_text(entries),
            Self::Json => render_json(entries),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(Self::Markdown),
            "txt" | "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

fn render_markdown(title: &str, entries: &[HistoryEntry]) -> Result<String, ExportError> {
    let mut out = format!("# {title} Location History\n\n");
    for entry in entries {
        // Two trailing spaces force a Markdown line break.
        write!(
            out,
            "- [{}]({})  \n  from {} until {}\n",
            entry.label(),
            place_url(&entry.place_id),
            display_timestamp(entry.start.as_deref())?,
            display_timestamp(entry.end.as_deref())?,
        )
        .unwrap();
    }
    Ok(out)
}

fn render_text(entries: &[HistoryEntry]) -> Result<String, ExportError> {
    let mut out = String::new();
    for entry in entries {
        writeln!(
            out,
            "{} ({}), from {} until {}",
            entry.label(),
            place_url(&entry.place_id),
            display_timestamp(entry.start.as_deref())?,
            display_timestamp(entry.end.as_deref())?,
        )
        .unwrap();
    }
    Ok(out)
}

#[derive(Serialize)]
struct JsonEntry<'a> {
    world_name: Option<&'a str>,
    world_url: String,
    start_datetime: Option<&'a str>,
    end_datetime: Option<&'a str>,
}

fn render_json(entries: &[HistoryEntry]) -> Result<String, ExportError> {
    let rows: Vec<JsonEntry<'_>> = entries
        .iter()
        .map(|entry| JsonEntry {
            world_name: entry.place_name.as_deref(),
            world_url: place_url(&entry.place_id),
            start_datetime: entry.start.as_deref(),
            end_datetime: entry.end.as_deref(),
        })
        .collect();
    Ok(serde_json::to_string(&rows)?)
}

/// Formats a stored timestamp in its own wall-clock time.
fn display_timestamp(value: Option<&str>) -> Result<String, ExportError> {
    let Some(value) = value else {
        return Ok(UNKNOWN.to_string());
    };
    parse_stored_timestamp(value).map(|naive| naive.format(DISPLAY_FORMAT).to_string())
}

/// Parses RFC 3339, its space-separated variant, or an offset-less timestamp.
fn parse_stored_timestamp(value: &str) -> Result<NaiveDateTime, ExportError> {
    let rfc3339 = match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => return Ok(dt.naive_local()),
        Err(e) => e,
    };
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive);
        }
    }
    Err(ExportError::Timestamp {
        value: value.to_string(),
        source: rfc3339,
    })
}
