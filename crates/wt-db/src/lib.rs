//! Storage layer for WarpTrail.
//!
//! Provides persistence for worlds, check-ins and visitors using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Each log follower opens its own `Database`, so concurrent followers never
//! interleave statements on a shared connection. A busy timeout lets their
//! short write transactions queue up instead of failing.
//!
//! # Schema
//!
//! - `worlds`: one row per visited place, named once a room name is seen
//! - `checkins`: occupancy intervals, unique on `(world_id, start_datetime)`
//! - `visitors`: presence intervals, unique on `(world_id, name, start_datetime)`
//!
//! Both interval tables reference `worlds(id)` with `ON DELETE CASCADE`. Table
//! names match databases written by earlier releases, so those open as-is.
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with the local offset at
//! second precision (e.g., `2022-04-05T21:44:16-07:00`). A NULL
//! `end_datetime` marks an interval that is still open.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use rusqlite::{Connection, params};
use thiserror::Error;

use wt_core::{HistoryEntry, PlaceId, SessionStore};

/// How long a writer waits for another connection's transaction to finish.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A stored presence interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorRecord {
    pub place_id: String,
    pub name: String,
    pub start: String,
    pub end: Option<String>,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub places: u64,
    pub checkins: u64,
    pub visitors: u64,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        tracing::debug!(path = %path.display(), "database ready");
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS worlds (
                id TEXT NOT NULL PRIMARY KEY,
                name TEXT
            );

            -- Occupancy intervals; end_datetime NULL while still present
            CREATE TABLE IF NOT EXISTS checkins (
                world_id TEXT NOT NULL,
                start_datetime TEXT NOT NULL,
                end_datetime TEXT,
                FOREIGN KEY (world_id) REFERENCES worlds(id) ON DELETE CASCADE
            );

            CREATE UNIQUE INDEX IF NOT EXISTS checkins_world_id_time_unique
                ON checkins(world_id, start_datetime);

            -- Presence intervals of other players in the same world
            CREATE TABLE IF NOT EXISTS visitors (
                world_id TEXT NOT NULL,
                name TEXT NOT NULL,
                start_datetime TEXT NOT NULL,
                end_datetime TEXT,
                FOREIGN KEY (world_id) REFERENCES worlds(id) ON DELETE CASCADE
            );

            CREATE UNIQUE INDEX IF NOT EXISTS visitors_world_id_name_time_unique
                ON visitors(world_id, name, start_datetime);
            ",
        )?;
        Ok(())
    }

    /// Lists every check-in joined to its world, in insertion order.
    pub fn list_history(&self) -> Result<Vec<HistoryEntry>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT worlds.id, worlds.name, checkins.start_datetime, checkins.end_datetime
            FROM checkins
            INNER JOIN worlds ON checkins.world_id = worlds.id
            ORDER BY checkins.rowid ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(HistoryEntry {
                place_id: row.get(0)?,
                place_name: row.get(1)?,
                start: row.get(2)?,
                end: row.get(3)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Lists check-ins that have not been closed, in insertion order.
    pub fn list_open_checkins(&self) -> Result<Vec<HistoryEntry>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT worlds.id, worlds.name, checkins.start_datetime, checkins.end_datetime
            FROM checkins
            INNER JOIN worlds ON checkins.world_id = worlds.id
            WHERE checkins.end_datetime IS NULL
            ORDER BY checkins.rowid ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(HistoryEntry {
                place_id: row.get(0)?,
                place_name: row.get(1)?,
                start: row.get(2)?,
                end: row.get(3)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Lists visitors recorded for a world, in insertion order.
    pub fn list_visitors(&self, place_id: &str) -> Result<Vec<VisitorRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT world_id, name, start_datetime, end_datetime
            FROM visitors
            WHERE world_id = ?
            ORDER BY rowid ASC
            ",
        )?;
        let rows = stmt.query_map([place_id], |row| {
            Ok(VisitorRecord {
                place_id: row.get(0)?,
                name: row.get(1)?,
                start: row.get(2)?,
                end: row.get(3)?,
            })
        })?;
        let mut visitors = Vec::new();
        for row in rows {
            visitors.push(row?);
        }
        Ok(visitors)
    }

    /// Counts rows in each table.
    pub fn counts(&self) -> Result<StoreCounts, DbError> {
        let counts = self.conn.query_row(
            "
            SELECT
                (SELECT COUNT(*) FROM worlds),
                (SELECT COUNT(*) FROM checkins),
                (SELECT COUNT(*) FROM visitors)
            ",
            [],
            |row| {
                Ok(StoreCounts {
                    places: row.get(0)?,
                    checkins: row.get(1)?,
                    visitors: row.get(2)?,
                })
            },
        )?;
        Ok(counts)
    }
}

impl SessionStore for Database {
    type Error = DbError;

    fn enter_place(
        &mut self,
        previous: Option<&PlaceId>,
        place: &PlaceId,
        at: DateTime<FixedOffset>,
    ) -> Result<(), DbError> {
        let at = format_timestamp(at);
        let tx = self.conn.transaction()?;
        if let Some(previous) = previous {
            close_intervals(&tx, previous.as_str(), &at)?;
        }
        tx.execute(
            "INSERT OR IGNORE INTO worlds (id) VALUES (?)",
            [place.as_str()],
        )?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO checkins (world_id, start_datetime) VALUES (?, ?)",
            params![place.as_str(), at],
        )?;
        tx.commit()?;
        if inserted == 0 {
            tracing::debug!(place = %place, at, "check-in already recorded");
        }
        Ok(())
    }

    fn name_place(&mut self, place: &PlaceId, name: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE worlds SET name = ? WHERE id = ?",
            params![name, place.as_str()],
        )?;
        Ok(())
    }

    fn occupant_arrived(
        &mut self,
        place: &PlaceId,
        name: &str,
        at: DateTime<FixedOffset>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO visitors (world_id, name, start_datetime) VALUES (?, ?, ?)",
            params![place.as_str(), name, format_timestamp(at)],
        )?;
        Ok(())
    }

    fn occupant_departed(
        &mut self,
        place: &PlaceId,
        name: &str,
        at: DateTime<FixedOffset>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "
            UPDATE visitors SET end_datetime = ?
            WHERE world_id = ? AND name = ? AND end_datetime IS NULL
            ",
            params![format_timestamp(at), place.as_str(), name],
        )?;
        Ok(())
    }

    fn close_open_intervals(
        &mut self,
        place: &PlaceId,
        at: DateTime<FixedOffset>,
    ) -> Result<(), DbError> {
        let at = format_timestamp(at);
        let tx = self.conn.transaction()?;
        close_intervals(&tx, place.as_str(), &at)?;
        tx.commit()?;
        Ok(())
    }
}

/// Ends every open check-in and visitor row for a world.
fn close_intervals(conn: &Connection, place_id: &str, at: &str) -> Result<(), DbError> {
    conn.execute(
        "UPDATE checkins SET end_datetime = ? WHERE world_id = ? AND end_datetime IS NULL",
        params![at, place_id],
    )?;
    conn.execute(
        "UPDATE visitors SET end_datetime = ? WHERE world_id = ? AND end_datetime IS NULL",
        params![at, place_id],
    )?;
    Ok(())
}

fn format_timestamp(timestamp: DateTime<FixedOffset>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, false)
}
