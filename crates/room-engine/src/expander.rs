//! Recurring date expansion: turns a base date, a repeat rule and an end date
//! into the concrete civil dates of a series.
//!
//! Wraps the `rrule` crate. Expansion happens at midnight UTC so that civil
//! dates never drift with DST; only the date part of each instance is kept.

use chrono::NaiveDate;
use rrule::RRuleSet;

use crate::error::{BookingError, Result};
use crate::model::Recurrence;

/// The dates of a series and whether the cap cut it short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub dates: Vec<NaiveDate>,
    /// `until` would have produced more dates than the cap allowed.
    pub truncated: bool,
}

/// Expand a recurrence into its dates, base date first.
///
/// - `Recurrence::None` or a missing `until` yields only `base`.
/// - `until` before or equal to `base` yields only `base`.
/// - Otherwise every date from `base` stepping 1 day (daily) or 7 days
///   (weekly) up to and including `until`, capped at `limit` dates.
///
/// # Errors
/// Returns `BookingError::Validation` if the rule cannot be built for the
/// given dates.
pub fn expand_dates(
    base: NaiveDate,
    recurrence: Recurrence,
    until: Option<NaiveDate>,
    limit: u16,
) -> Result<Vec<NaiveDate>> {
    expand_series(base, recurrence, until, limit).map(|expansion| expansion.dates)
}

/// Like [`expand_dates`], also reporting whether the cap dropped dates.
///
/// # Errors
/// Returns `BookingError::Validation` if the rule cannot be built for the
/// given dates.
pub fn expand_series(
    base: NaiveDate,
    recurrence: Recurrence,
    until: Option<NaiveDate>,
    limit: u16,
) -> Result<Expansion> {
    let single = Expansion {
        dates: vec![base],
        truncated: false,
    };
    let freq = match recurrence {
        Recurrence::None => return Ok(single),
        Recurrence::Daily => "DAILY",
        Recurrence::Weekly => "WEEKLY",
    };
    let until = match until {
        Some(until) if until > base => until,
        _ => return Ok(single),
    };

    // UNTIL must share DTSTART's timezone; for UTC it carries the "Z" suffix.
    let rrule_text = format!(
        "DTSTART;TZID=UTC:{}T000000\nRRULE:FREQ={};UNTIL={}T000000Z",
        base.format("%Y%m%d"),
        freq,
        until.format("%Y%m%d"),
    );

    let rrule_set: RRuleSet = rrule_text
        .parse()
        .map_err(|e| BookingError::Validation(format!("Invalid recurrence: {e}")))?;

    // `RRuleResult::limited` is also set when the rule ends exactly at the
    // cap, so ask for one extra date to tell the two apart.
    let limit = usize::from(limit.max(1));
    let fetch_limit = u16::try_from(limit + 1).unwrap_or(u16::MAX);
    let mut dates: Vec<NaiveDate> = rrule_set
        .all(fetch_limit)
        .dates
        .into_iter()
        .map(|dt| dt.date_naive())
        .collect();
    let truncated = dates.len() > limit;
    dates.truncate(limit);

    Ok(Expansion { dates, truncated })
}
