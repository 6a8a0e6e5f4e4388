//! Recurring series creation and cancellation.

mod common;

use common::{at, date, fixture, internal};
use room_engine::{Actor, BookingStatus, Recurrence, SeriesRequest, Settings};

fn daily(f: &common::Fixture, from: (u32, u32), until: (u32, u32)) -> SeriesRequest {
    SeriesRequest {
        booking: internal(f.room.id, date(2024, from.0, from.1), "10:00", "11:00"),
        recurrence: Recurrence::Daily,
        until: Some(date(2024, until.0, until.1)),
    }
}

#[test]
fn daily_series_skips_conflicting_dates() {
    let f = fixture();
    f.engine
        .create_booking(
            &Actor::user("bob"),
            &internal(f.room.id, date(2024, 1, 2), "10:30", "11:30"),
        )
        .unwrap();

    let outcome = f
        .engine
        .create_recurring_series(&Actor::user("alice"), &daily(&f, (1, 1), (1, 3)))
        .unwrap();

    assert_eq!(outcome.requested_count, 3);
    let dates: Vec<_> = outcome.created.iter().map(|b| b.date).collect();
    assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 1, 3)]);
    assert_eq!(outcome.skipped_dates, vec![date(2024, 1, 2)]);

    let series = outcome.series_id.unwrap();
    assert!(outcome.created.iter().all(|b| b.series_id == Some(series)));
    assert_eq!(outcome.created_ids().len(), 2);
}

#[test]
fn conflicting_base_date_creates_nothing() {
    let f = fixture();
    f.engine
        .create_booking(
            &Actor::user("bob"),
            &internal(f.room.id, date(2024, 1, 1), "10:00", "11:00"),
        )
        .unwrap();
    f.sink.take();

    let err = f
        .engine
        .create_recurring_series(&Actor::user("alice"), &daily(&f, (1, 1), (1, 5)))
        .unwrap_err();

    assert_eq!(err.code(), "conflict");
    assert_eq!(f.engine.calendar(date(2024, 1, 1), date(2024, 1, 31)).unwrap().len(), 1);
    assert!(f.sink.take().is_empty());
}

#[test]
fn weekly_series_lands_on_the_same_weekday() {
    let f = fixture();
    let request = SeriesRequest {
        booking: internal(f.room.id, date(2024, 1, 1), "14:00", "15:00"),
        recurrence: Recurrence::Weekly,
        until: Some(date(2024, 1, 22)),
    };

    let outcome = f
        .engine
        .create_recurring_series(&Actor::user("alice"), &request)
        .unwrap();

    let dates: Vec<_> = outcome.created.iter().map(|b| b.date).collect();
    assert_eq!(
        dates,
        vec![date(2024, 1, 1), date(2024, 1, 8), date(2024, 1, 15), date(2024, 1, 22)]
    );
    assert!(outcome.skipped_dates.is_empty());
}

#[test]
fn single_request_has_no_series_id() {
    let f = fixture();
    let request = SeriesRequest {
        booking: internal(f.room.id, date(2024, 1, 1), "10:00", "11:00"),
        recurrence: Recurrence::None,
        until: Some(date(2024, 1, 5)),
    };

    let outcome = f
        .engine
        .create_recurring_series(&Actor::user("alice"), &request)
        .unwrap();

    assert!(outcome.series_id.is_none());
    assert_eq!(outcome.requested_count, 1);
    assert_eq!(outcome.created.len(), 1);
}

#[test]
fn each_occurrence_emits_its_own_events() {
    let f = fixture();
    f.engine
        .create_recurring_series(&Actor::user("alice"), &daily(&f, (1, 1), (1, 2)))
        .unwrap();

    assert_eq!(
        f.event_kinds(),
        vec![
            "booking_created",
            "booking_approved",
            "booking_created",
            "booking_approved"
        ]
    );
}

#[test]
fn series_length_is_capped_by_settings() {
    let settings = Settings::from_pairs([("max_series_occurrences", "5")]).unwrap();
    let f = common::fixture_with(settings);

    let outcome = f
        .engine
        .create_recurring_series(&Actor::user("alice"), &daily(&f, (1, 1), (3, 1)))
        .unwrap();

    assert_eq!(outcome.requested_count, 5);
    assert_eq!(outcome.created.len(), 5);
    assert!(outcome.skipped_dates.is_empty());
    assert!(outcome.truncated);
    assert_eq!(outcome.created[4].date, date(2024, 1, 5));
}

#[test]
fn series_ending_exactly_at_the_cap_is_not_truncated() {
    let settings = Settings::from_pairs([("max_series_occurrences", "5")]).unwrap();
    let f = common::fixture_with(settings);

    let outcome = f
        .engine
        .create_recurring_series(&Actor::user("alice"), &daily(&f, (1, 1), (1, 5)))
        .unwrap();

    assert_eq!(outcome.requested_count, 5);
    assert!(!outcome.truncated);
}

// ── cancel_series ───────────────────────────────────────────────────────

#[test]
fn cancel_series_cancels_upcoming_occurrences() {
    let f = fixture();
    let alice = Actor::user("alice");
    let outcome = f
        .engine
        .create_recurring_series(&alice, &daily(&f, (1, 1), (1, 4)))
        .unwrap();
    // Day two of four, after that day's meeting ended.
    f.clock.set(at(2024, 1, 2, 12, 0));

    let cancelled = f.engine.cancel_series(&alice, &outcome.created[3].id).unwrap();

    let dates: Vec<_> = cancelled.iter().map(|b| b.date).collect();
    assert_eq!(dates, vec![date(2024, 1, 3), date(2024, 1, 4)]);
    for booking in &outcome.created[..2] {
        assert_eq!(
            f.engine.booking(&alice, &booking.id).unwrap().status(),
            BookingStatus::Approved
        );
    }
}

#[test]
fn cancel_series_on_single_booking_fails() {
    let f = fixture();
    let alice = Actor::user("alice");
    let booking = f
        .engine
        .create_booking(&alice, &internal(f.room.id, date(2024, 1, 2), "10:00", "11:00"))
        .unwrap();

    let err = f.engine.cancel_series(&alice, &booking.id).unwrap_err();
    assert_eq!(err.code(), "not_recurring");
}

#[test]
fn cancel_series_requires_ownership() {
    let f = fixture();
    let outcome = f
        .engine
        .create_recurring_series(&Actor::user("alice"), &daily(&f, (1, 1), (1, 3)))
        .unwrap();

    let err = f
        .engine
        .cancel_series(&Actor::user("mallory"), &outcome.created[0].id)
        .unwrap_err();
    assert_eq!(err.code(), "unauthorized");

    let cancelled = f.engine.cancel_series(&f.admin, &outcome.created[0].id).unwrap();
    assert_eq!(cancelled.len(), 3);
}
