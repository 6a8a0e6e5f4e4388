//! Tests for recurring date expansion.

use chrono::{Datelike, NaiveDate, Weekday};
use room_engine::expander::{expand_dates, expand_series};
use room_engine::Recurrence;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

#[test]
fn no_recurrence_yields_base_only() {
    let dates = expand_dates(date(2024, 1, 1), Recurrence::None, Some(date(2024, 2, 1)), 366)
        .unwrap();
    assert_eq!(dates, vec![date(2024, 1, 1)]);
}

#[test]
fn missing_until_yields_base_only() {
    let dates = expand_dates(date(2024, 1, 1), Recurrence::Daily, None, 366).unwrap();
    assert_eq!(dates, vec![date(2024, 1, 1)]);
}

#[test]
fn until_not_after_base_yields_base_only() {
    for until in [date(2024, 1, 1), date(2023, 12, 25)] {
        let dates = expand_dates(date(2024, 1, 1), Recurrence::Weekly, Some(until), 366).unwrap();
        assert_eq!(dates, vec![date(2024, 1, 1)]);
    }
}

#[test]
fn daily_includes_until() {
    let dates = expand_dates(date(2024, 1, 1), Recurrence::Daily, Some(date(2024, 1, 3)), 366)
        .unwrap();
    assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3)]);
}

#[test]
fn daily_crosses_month_and_leap_day() {
    let dates = expand_dates(
        date(2024, 2, 28),
        Recurrence::Daily,
        Some(date(2024, 3, 1)),
        366,
    )
    .unwrap();
    assert_eq!(dates, vec![date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)]);
}

#[test]
fn weekly_steps_seven_days_on_same_weekday() {
    let dates = expand_dates(
        date(2024, 1, 1),
        Recurrence::Weekly,
        Some(date(2024, 1, 31)),
        366,
    )
    .unwrap();

    assert_eq!(
        dates,
        vec![
            date(2024, 1, 1),
            date(2024, 1, 8),
            date(2024, 1, 15),
            date(2024, 1, 22),
            date(2024, 1, 29),
        ]
    );
    assert!(dates.iter().all(|d| d.weekday() == Weekday::Mon));
}

#[test]
fn weekly_until_between_steps_is_not_included() {
    let dates = expand_dates(date(2024, 1, 1), Recurrence::Weekly, Some(date(2024, 1, 10)), 366)
        .unwrap();
    assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 1, 8)]);
}

#[test]
fn expansion_is_capped_at_limit() {
    let dates = expand_dates(date(2024, 1, 1), Recurrence::Daily, Some(date(2025, 1, 1)), 10)
        .unwrap();
    assert_eq!(dates.len(), 10);
    assert_eq!(dates[9], date(2024, 1, 10));
}

#[test]
fn capped_expansion_reports_truncation() {
    let capped = expand_series(date(2024, 1, 1), Recurrence::Weekly, Some(date(2024, 3, 1)), 4)
        .unwrap();
    assert_eq!(capped.dates.len(), 4);
    assert!(capped.truncated);

    let exact = expand_series(date(2024, 1, 1), Recurrence::Weekly, Some(date(2024, 1, 22)), 4)
        .unwrap();
    assert_eq!(exact.dates.len(), 4);
    assert!(!exact.truncated);

    let single = expand_series(date(2024, 1, 1), Recurrence::None, Some(date(2024, 3, 1)), 1)
        .unwrap();
    assert!(!single.truncated);
}
