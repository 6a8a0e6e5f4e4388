//! Compute free time slots of one room-day from its busy ranges.
//!
//! Sorts busy ranges by start time, merges overlapping busy periods, then
//! computes the gaps between merged periods within a window (normally the
//! office hours).

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::conflict::TimeRange;
use crate::model::hhmm;

/// A free time slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeSlot {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    pub duration_minutes: i64,
}

impl FreeSlot {
    fn new(start: NaiveTime, end: NaiveTime) -> Self {
        FreeSlot {
            start,
            end,
            duration_minutes: (end - start).num_minutes(),
        }
    }
}

/// Merge overlapping or adjacent busy periods, clipped to the given window.
///
/// Returns a sorted, non-overlapping list of ranges.
pub(crate) fn merge_busy_periods(busy: &[TimeRange], window: TimeRange) -> Vec<TimeRange> {
    let mut intervals: Vec<TimeRange> = busy
        .iter()
        .filter(|r| r.overlaps(&window))
        .map(|r| TimeRange::new(r.start.max(window.start), r.end.min(window.end)))
        .collect();

    intervals.sort_by_key(|r| (r.start, r.end));

    let mut merged: Vec<TimeRange> = Vec::with_capacity(intervals.len());
    for range in intervals {
        if let Some(last) = merged.last_mut() {
            if range.start <= last.end {
                last.end = last.end.max(range.end);
                continue;
            }
        }
        merged.push(range);
    }

    merged
}

/// Find free slots within `window`, given possibly overlapping busy ranges.
///
/// Returns free slots sorted by start time.
pub fn find_free_slots(busy: &[TimeRange], window: TimeRange) -> Vec<FreeSlot> {
    let merged = merge_busy_periods(busy, window);

    let mut free_slots = Vec::new();
    let mut cursor = window.start;

    for range in &merged {
        if cursor < range.start {
            free_slots.push(FreeSlot::new(cursor, range.start));
        }
        cursor = cursor.max(range.end);
    }

    if cursor < window.end {
        free_slots.push(FreeSlot::new(cursor, window.end));
    }

    free_slots
}

/// The first free slot of at least `min_duration_minutes` within the window.
pub fn find_first_free_slot(
    busy: &[TimeRange],
    window: TimeRange,
    min_duration_minutes: i64,
) -> Option<FreeSlot> {
    find_free_slots(busy, window)
        .into_iter()
        .find(|slot| slot.duration_minutes >= min_duration_minutes)
}
