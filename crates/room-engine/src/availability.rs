//! Per-room availability for one civil date.
//!
//! Splits the office hours into hourly cells. A cell is busy only when an
//! approved booking overlaps it; pending requests are counted but do not
//! block, since they are still waiting for an administrator. The merged free
//! gaps of the day are computed with [`freebusy::find_free_slots`].

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::conflict::TimeRange;
use crate::freebusy::{self, FreeSlot};
use crate::model::{hhmm, Booking, BookingStatus, RoomId};
use crate::settings::Settings;

/// One hourly cell of the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourSlot {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    /// No approved booking overlaps this cell.
    pub free: bool,
    /// Pending requests overlapping this cell.
    pub pending_requests: usize,
}

/// An active (pending or approved) booking as shown on the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occupancy {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomAvailability {
    pub room_id: RoomId,
    pub date: NaiveDate,
    pub slots: Vec<HourSlot>,
    /// Gaps between approved bookings inside office hours.
    pub free: Vec<FreeSlot>,
    pub bookings: Vec<Occupancy>,
}

/// Build the availability view of `room_id` on `date` from that day's bookings.
///
/// Bookings of other rooms or dates, and rejected or cancelled ones, are ignored.
pub fn room_availability<'a, I>(
    room_id: RoomId,
    date: NaiveDate,
    bookings: I,
    settings: &Settings,
) -> RoomAvailability
where
    I: IntoIterator<Item = &'a Booking>,
{
    let active: Vec<&Booking> = bookings
        .into_iter()
        .filter(|b| b.room_id == room_id && b.date == date && !b.status().is_terminal())
        .collect();

    let approved: Vec<TimeRange> = active
        .iter()
        .filter(|b| b.status() == BookingStatus::Approved)
        .map(|b| b.range())
        .collect();

    let slots = hourly_cells(settings)
        .into_iter()
        .map(|cell| {
            let free = !approved.iter().any(|r| r.overlaps(&cell));
            let pending_requests = active
                .iter()
                .filter(|b| b.status() == BookingStatus::Pending && b.range().overlaps(&cell))
                .count();
            HourSlot {
                start: cell.start,
                end: cell.end,
                free,
                pending_requests,
            }
        })
        .collect();

    let office = TimeRange::new(settings.office_open, settings.office_close);
    let free = freebusy::find_free_slots(&approved, office);

    let mut bookings: Vec<Occupancy> = active
        .iter()
        .map(|b| Occupancy {
            start: b.start,
            end: b.end,
            status: b.status(),
        })
        .collect();
    bookings.sort_by_key(|o| (o.start, o.end));

    RoomAvailability {
        room_id,
        date,
        slots,
        free,
        bookings,
    }
}

/// Hour-long cells from opening to closing; the last one is cut at closing.
fn hourly_cells(settings: &Settings) -> Vec<TimeRange> {
    let mut cells = Vec::new();
    let mut cursor = settings.office_open;
    while cursor < settings.office_close {
        let (next, wrapped) = cursor.overflowing_add_signed(Duration::hours(1));
        let end = if wrapped != 0 || next > settings.office_close {
            settings.office_close
        } else {
            next
        };
        cells.push(TimeRange::new(cursor, end));
        cursor = end;
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_office_hours_give_eleven_cells() {
        let cells = hourly_cells(&Settings::default());
        assert_eq!(cells.len(), 11);
        assert_eq!(cells[0].start.format("%H:%M").to_string(), "09:00");
        assert_eq!(cells[10].end.format("%H:%M").to_string(), "20:00");
    }

    #[test]
    fn last_cell_is_cut_at_closing() {
        let settings = Settings::from_pairs([("office_open", "09:30"), ("office_close", "11:00")])
            .unwrap();
        let cells = hourly_cells(&settings);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[1].start.format("%H:%M").to_string(), "10:30");
        assert_eq!(cells[1].end.format("%H:%M").to_string(), "11:00");
    }
}
