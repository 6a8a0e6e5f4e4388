//! Half-open overlap on time-of-day ranges.
//!
//! Two ranges `[a, b)` and `[c, d)` overlap iff `a < d && c < b`. Adjacent
//! ranges (one ends exactly when the other starts) are NOT conflicts.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::model::hhmm;

/// A `[start, end)` range within one civil day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        TimeRange { start, end }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Return every item of `existing` whose range overlaps `candidate`, in input order.
pub fn find_conflicts<'a, T, I, F>(candidate: &TimeRange, existing: I, range_of: F) -> Vec<&'a T>
where
    T: 'a,
    I: IntoIterator<Item = &'a T>,
    F: Fn(&T) -> TimeRange,
{
    existing
        .into_iter()
        .filter(|item| range_of(item).overlaps(candidate))
        .collect()
}
