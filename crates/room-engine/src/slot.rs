//! Slot validation.
//!
//! Checks a candidate `(room, date, start, end, headcount)` against the
//! business rules and the approved reservations already in the ledger. Rules
//! are evaluated in a fixed order and the first failure wins:
//!
//! 1. times parse as `HH:MM` and start < end
//! 2. inside office hours
//! 3. at least the minimum slot length
//! 4. not on a past date
//! 5. room exists and is not blocked
//! 6. within the room's maximum duration
//! 7. headcount within capacity
//! 8. no overlap with an approved booking in the same room and date
//!
//! Pending bookings never block: they are unresolved demand, settled at
//! approval time.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::conflict::{find_conflicts, TimeRange};
use crate::error::{BookingError, Result};
use crate::model::{parse_time, Booking, BookingId, BookingStatus, RoomId};
use crate::settings::Settings;
use crate::store::Ledger;

/// A candidate slot as received from a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotQuery {
    pub room_id: RoomId,
    pub date: NaiveDate,
    /// `HH:MM`
    pub start: String,
    /// `HH:MM`
    pub end: String,
    #[serde(default)]
    pub headcount: Option<u32>,
    /// Ignore this booking when looking for overlaps (re-validation of itself).
    #[serde(default)]
    pub exclude: Option<BookingId>,
}

/// A candidate slot with parsed times.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Slot {
    pub room_id: RoomId,
    pub date: NaiveDate,
    pub range: TimeRange,
    pub headcount: Option<u32>,
    pub exclude: Option<BookingId>,
}

/// Validate a slot query. Returns the parsed range when the slot is bookable.
///
/// # Errors
/// `BookingError::Conflict` when an approved booking overlaps (naming its owner
/// and range); `BookingError::Validation` for every other rule.
pub fn validate_slot(
    ledger: &Ledger,
    settings: &Settings,
    today: NaiveDate,
    query: &SlotQuery,
) -> Result<TimeRange> {
    let range = TimeRange::new(parse_time(&query.start)?, parse_time(&query.end)?);
    check_slot(
        ledger,
        settings,
        today,
        &Slot {
            room_id: query.room_id,
            date: query.date,
            range,
            headcount: query.headcount,
            exclude: query.exclude,
        },
    )?;
    Ok(range)
}

pub(crate) fn check_slot(
    ledger: &Ledger,
    settings: &Settings,
    today: NaiveDate,
    slot: &Slot,
) -> Result<()> {
    let range = slot.range;
    if range.start >= range.end {
        return Err(invalid("End must be after start."));
    }
    if range.start < settings.office_open || range.end > settings.office_close {
        return Err(invalid(format!(
            "Office hours: {}–{} only.",
            settings.office_open.format("%H:%M"),
            settings.office_close.format("%H:%M")
        )));
    }
    let minutes = range.duration_minutes();
    if minutes < i64::from(settings.min_slot_minutes) {
        return Err(invalid(format!(
            "Minimum {} minutes.",
            settings.min_slot_minutes
        )));
    }
    if slot.date < today {
        return Err(invalid("Cannot book in the past."));
    }

    let room = ledger
        .room(&slot.room_id)
        .ok_or_else(|| invalid("Room not found."))?;
    if room.blocked {
        return Err(invalid("Room is currently blocked."));
    }
    if minutes > i64::from(room.max_duration_minutes) {
        return Err(invalid(format!(
            "Exceeds max {} minutes for this room.",
            room.max_duration_minutes
        )));
    }
    if let Some(persons) = slot.headcount {
        if persons > room.capacity {
            return Err(invalid(format!(
                "Exceeds room capacity ({}).",
                room.capacity
            )));
        }
    }

    match approved_overlap(ledger, slot.room_id, slot.date, range, slot.exclude) {
        Some(existing) => Err(conflict_with(existing)),
        None => Ok(()),
    }
}

/// The earliest approved booking in `room` on `date` overlapping `range`,
/// ignoring `exclude`.
pub(crate) fn approved_overlap(
    ledger: &Ledger,
    room: RoomId,
    date: NaiveDate,
    range: TimeRange,
    exclude: Option<BookingId>,
) -> Option<&Booking> {
    let approved = ledger
        .bookings_with_status(room, date, BookingStatus::Approved)
        .filter(|b| Some(b.id) != exclude);
    find_conflicts(&range, approved, Booking::range)
        .into_iter()
        .min_by_key(|b| (b.start, b.end))
}

pub(crate) fn conflict_with(existing: &Booking) -> BookingError {
    BookingError::Conflict {
        booking_id: existing.id,
        owner: existing.user_id.clone(),
        start: existing.start,
        end: existing.end,
    }
}

fn invalid(message: impl Into<String>) -> BookingError {
    BookingError::Validation(message.into())
}
