//! Classification of raw log lines into session events.
//!
//! Each pattern is tested independently against the line and requires a
//! leading `YYYY.MM.DD HH:MM:SS` timestamp. Lines that match nothing are not
//! an error; they simply produce no events.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, TimeZone};
use regex::Regex;

use crate::PlaceId;

/// Timestamp layout used at the start of every VRChat log line.
const LOG_TIMESTAMP_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

static PLACE_ENTERED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9.]+ [0-9:]+).+Joining (wrld_[0-9a-f-]{36})").expect("valid regex")
});

static PLACE_NAMED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9.]+ [0-9:]+).+Joining or Creating Room: (.+)").expect("valid regex")
});

static OCCUPANT_ARRIVED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9.]+ [0-9:]+).+OnPlayerJoined (.+)").expect("valid regex")
});

static OCCUPANT_DEPARTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9.]+ [0-9:]+).+OnPlayerLeft (.+)").expect("valid regex")
});

/// A session event recognised in one log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// The local player joined a world.
    PlaceEntered {
        at: DateTime<FixedOffset>,
        place: PlaceId,
    },
    /// The room being joined announced its display name.
    PlaceNamed { name: String },
    /// Another player appeared in the current world.
    OccupantArrived {
        at: DateTime<FixedOffset>,
        name: String,
    },
    /// Another player left the current world.
    OccupantDeparted {
        at: DateTime<FixedOffset>,
        name: String,
    },
}

impl LogEvent {
    /// Short label used in log output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PlaceEntered { .. } => "place_entered",
            Self::PlaceNamed { .. } => "place_named",
            Self::OccupantArrived { .. } => "occupant_arrived",
            Self::OccupantDeparted { .. } => "occupant_departed",
        }
    }
}

/// Classifies a line, resolving timestamps in the local time zone.
pub fn classify_line(line: &str) -> Vec<LogEvent> {
    classify_line_in(line, &Local)
}

/// Classifies a line, resolving timestamps in the given time zone.
///
/// Events are returned in pattern order: entered, named, arrived, departed.
pub fn classify_line_in<Tz: TimeZone>(line: &str, tz: &Tz) -> Vec<LogEvent> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut events = Vec::new();

    if let Some(caps) = PLACE_ENTERED_RE.captures(line) {
        if let (Some(at), Ok(place)) = (
            parse_log_timestamp(&caps[1], tz),
            caps[2].parse::<PlaceId>(),
        ) {
            events.push(LogEvent::PlaceEntered { at, place });
        }
    }

    if let Some(caps) = PLACE_NAMED_RE.captures(line) {
        if parse_log_timestamp(&caps[1], tz).is_some() {
            events.push(LogEvent::PlaceNamed {
                name: caps[2].to_string(),
            });
        }
    }

    if let Some((at, name)) = timestamped_capture(&OCCUPANT_ARRIVED_RE, line, tz) {
        events.push(LogEvent::OccupantArrived { at, name });
    }

    if let Some((at, name)) = timestamped_capture(&OCCUPANT_DEPARTED_RE, line, tz) {
        events.push(LogEvent::OccupantDeparted { at, name });
    }

    events
}

/// Matches `re` and returns its timestamp together with the trailing text.
fn timestamped_capture<Tz: TimeZone>(
    re: &Regex,
    line: &str,
    tz: &Tz,
) -> Option<(DateTime<FixedOffset>, String)> {
    let caps = re.captures(line)?;
    let at = parse_log_timestamp(&caps[1], tz)?;
    Some((at, caps[2].to_string()))
}

/// Parses a log timestamp as wall-clock time in `tz`.
///
/// Ambiguous local times resolve to the earlier instant; times skipped by a
/// DST transition do not resolve at all.
fn parse_log_timestamp<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<FixedOffset>> {
    let naive = match NaiveDateTime::parse_from_str(raw, LOG_TIMESTAMP_FORMAT) {
        Ok(naive) => naive,
        Err(e) => {
            tracing::trace!(raw, error = %e, "unparseable log timestamp");
            return None;
        }
    };
    let local = tz.from_local_datetime(&naive).earliest()?;
    let offset = local.offset().fix();
    Some(local.with_timezone(&offset))
}
