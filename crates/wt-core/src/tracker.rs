//! Session tracking: turning classified events into interval mutations.
//!
//! The tracker holds a single piece of cross-line state, the place the
//! subject is currently in. Every event becomes exactly one store call, and
//! each store call is expected to commit on its own so a crash never loses
//! more than the in-memory current place.
//!
//! A naming event is assumed to follow the entry event of the place it names.
//! This is not validated: a name logged before its entry line (or after a
//! stale entry) labels whatever place is current at that moment.

use chrono::{DateTime, FixedOffset};

use crate::{LogEvent, PlaceId};

/// Durable interval storage driven by a [`SessionTracker`].
///
/// Each method must apply its mutation atomically and commit before
/// returning.
pub trait SessionStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Closes open intervals for `previous` at `at`, upserts `place` without
    /// touching an existing name, and opens an occupancy interval for `place`
    /// starting at `at`. Re-opening with an identical start is a no-op.
    fn enter_place(
        &mut self,
        previous: Option<&PlaceId>,
        place: &PlaceId,
        at: DateTime<FixedOffset>,
    ) -> Result<(), Self::Error>;

    /// Sets the display name of `place`; the last write wins.
    fn name_place(&mut self, place: &PlaceId, name: &str) -> Result<(), Self::Error>;

    /// Opens a presence interval for `name` at `place`. Duplicates are ignored.
    fn occupant_arrived(
        &mut self,
        place: &PlaceId,
        name: &str,
        at: DateTime<FixedOffset>,
    ) -> Result<(), Self::Error>;

    /// Closes the open presence interval for `name` at `place`, if any.
    fn occupant_departed(
        &mut self,
        place: &PlaceId,
        name: &str,
        at: DateTime<FixedOffset>,
    ) -> Result<(), Self::Error>;

    /// Closes every open occupancy and presence interval for `place`.
    fn close_open_intervals(
        &mut self,
        place: &PlaceId,
        at: DateTime<FixedOffset>,
    ) -> Result<(), Self::Error>;
}

/// Per-task session state machine.
///
/// Owns its store connection so independent tasks never share state.
#[derive(Debug)]
pub struct SessionTracker<S> {
    store: S,
    current_place: Option<PlaceId>,
}

impl<S: SessionStore> SessionTracker<S> {
    pub const fn new(store: S) -> Self {
        Self {
            store,
            current_place: None,
        }
    }

    /// The most recently entered place, if any.
    pub const fn current_place(&self) -> Option<&PlaceId> {
        self.current_place.as_ref()
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Applies one event to the store.
    pub fn apply(&mut self, event: &LogEvent) -> Result<(), S::Error> {
        match event {
            LogEvent::PlaceEntered { at, place } => {
                tracing::info!(place = %place, at = %at.to_rfc3339(), "entered place");
                self.store
                    .enter_place(self.current_place.as_ref(), place, *at)?;
                self.current_place = Some(place.clone());
            }
            LogEvent::PlaceNamed { name } => {
                let Some(place) = &self.current_place else {
                    tracing::debug!(name, "place name with no current place; ignoring");
                    return Ok(());
                };
                tracing::info!(place = %place, name, "found place name");
                self.store.name_place(place, name)?;
            }
            LogEvent::OccupantArrived { at, name } => {
                let Some(place) = &self.current_place else {
                    tracing::debug!(name, "arrival with no current place; ignoring");
                    return Ok(());
                };
                tracing::info!(place = %place, name, at = %at.to_rfc3339(), "player joined");
                self.store.occupant_arrived(place, name, *at)?;
            }
            LogEvent::OccupantDeparted { at, name } => {
                let Some(place) = &self.current_place else {
                    tracing::debug!(name, "departure with no current place; ignoring");
                    return Ok(());
                };
                tracing::info!(place = %place, name, at = %at.to_rfc3339(), "player left");
                self.store.occupant_departed(place, name, *at)?;
            }
        }
        Ok(())
    }

    /// Closes whatever is still open for the current place at `now`.
    ///
    /// The current place is kept, so calling this twice only re-closes
    /// intervals that are already closed, which changes nothing.
    pub fn finalize(&mut self, now: DateTime<FixedOffset>) -> Result<(), S::Error> {
        let Some(place) = &self.current_place else {
            return Ok(());
        };
        tracing::debug!(place = %place, at = %now.to_rfc3339(), "closing open intervals");
        self.store.close_open_intervals(place, now)
    }
}
