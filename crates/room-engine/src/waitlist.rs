//! Waitlist registration and slot matching.
//!
//! When a booking leaves the active set, every un-notified entry for that
//! room and date whose desired window overlaps the freed range is latched as
//! notified and told, earliest arrival first. Notification is not a
//! reservation: several waiters may hear about the same slot, and the slot
//! validator decides who actually gets it.

use chrono::{NaiveDate, NaiveTime};

use crate::conflict::TimeRange;
use crate::error::{BookingError, Result};
use crate::events::Event;
use crate::model::{parse_time, Actor, RoomId, WaitlistEntry, WaitlistId, WaitlistRequest};
use crate::store::{Ledger, Store};
use crate::Engine;

/// Latch and return the entries matching a freed slot, in arrival order.
pub(crate) fn match_waitlist(
    ledger: &mut Ledger,
    room_id: RoomId,
    date: NaiveDate,
    freed: TimeRange,
) -> Vec<WaitlistEntry> {
    let waiting: Vec<usize> = ledger
        .waitlist()
        .enumerate()
        .filter(|(_, entry)| {
            entry.room_id == room_id
                && entry.date == date
                && !entry.notified()
                && entry.range().overlaps(&freed)
        })
        .map(|(index, _)| index)
        .collect();
    waiting
        .into_iter()
        .filter_map(|index| ledger.latch_waitlist_notified(index))
        .collect()
}

impl<S: Store> Engine<S> {
    /// Join the waitlist for a slot.
    ///
    /// # Errors
    /// `Validation` for missing purpose or bad times, `NotFound` for an unknown
    /// room, `AlreadyWaitlisted` when the actor already waits for the identical
    /// slot.
    pub fn register_waitlist_entry(
        &self,
        actor: &Actor,
        request: &WaitlistRequest,
    ) -> Result<WaitlistEntry> {
        if request.purpose.trim().is_empty() {
            return Err(BookingError::Validation("Purpose is required.".to_string()));
        }
        let range = TimeRange::new(parse_time(&request.start)?, parse_time(&request.end)?);
        if range.start >= range.end {
            return Err(BookingError::Validation(
                "End must be after start.".to_string(),
            ));
        }
        let now = self.now();

        let entry = self.store.transact(|ledger| {
            if ledger.room(&request.room_id).is_none() {
                return Err(BookingError::not_found("room", request.room_id));
            }
            let duplicate = ledger.waitlist().any(|w| {
                w.user_id == actor.user_id
                    && w.room_id == request.room_id
                    && w.date == request.date
                    && w.range() == range
            });
            if duplicate {
                return Err(BookingError::AlreadyWaitlisted);
            }
            let sequence = ledger.take_sequence();
            let entry = WaitlistEntry::new(
                actor.user_id.clone(),
                request.room_id,
                request.date,
                range,
                request.purpose.trim().to_string(),
                now,
                sequence,
            );
            ledger.insert_waitlist(entry.clone());
            Ok(entry)
        })?;

        tracing::info!(entry = %entry.id, room = %entry.room_id, date = %entry.date, "waitlist joined");
        Ok(entry)
    }

    /// Leave the waitlist. Owners and admins only.
    pub fn remove_waitlist_entry(&self, actor: &Actor, id: &WaitlistId) -> Result<WaitlistEntry> {
        self.store.transact(|ledger| {
            let entry = ledger
                .waitlist_entry(id)
                .ok_or_else(|| BookingError::not_found("waitlist entry", id))?;
            actor.require_manage(&entry.user_id, "waitlist entry")?;
            ledger
                .remove_waitlist(id)
                .ok_or_else(|| BookingError::not_found("waitlist entry", id))
        })
    }

    /// The actor's entries (all entries for admins), newest first.
    pub fn waitlist(&self, actor: &Actor) -> Result<Vec<WaitlistEntry>> {
        let mut entries: Vec<WaitlistEntry> = self.store.read(|ledger| {
            ledger
                .waitlist()
                .filter(|w| actor.can_manage(&w.user_id))
                .cloned()
                .collect()
        })?;
        entries.reverse();
        Ok(entries)
    }

    /// Offer a freed slot to the waitlist. Called by cancel and reject; also
    /// usable directly when a slot frees up by other means.
    pub fn on_slot_freed(
        &self,
        room_id: RoomId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<Vec<WaitlistEntry>> {
        let freed = TimeRange::new(start, end);
        let notified = self
            .store
            .transact(|ledger| Ok(match_waitlist(ledger, room_id, date, freed)))?;
        if !notified.is_empty() {
            tracing::info!(%room_id, %date, notified = notified.len(), "waitlist notified");
        }
        self.emit(
            notified
                .iter()
                .cloned()
                .map(|entry| Event::SlotAvailable { entry }),
        );
        Ok(notified)
    }
}
