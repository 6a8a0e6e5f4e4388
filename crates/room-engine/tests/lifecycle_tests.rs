//! Creation, approval cascade, rejection and cancellation.

mod common;

use chrono::Duration;
use common::{at, date, external, fixture, internal};
use room_engine::{
    Actor, BookingError, BookingFilter, BookingStatus, Event, MeetingKind, Recipient,
    StateViolation, CASCADE_REJECTION_REASON,
};

fn violation(err: BookingError) -> StateViolation {
    match err {
        BookingError::State { violation, .. } => violation,
        other => panic!("expected state violation, got {other:?}"),
    }
}

// ── Creation ────────────────────────────────────────────────────────────

#[test]
fn internal_booking_is_auto_approved() {
    let f = fixture();
    let booking = f
        .engine
        .create_booking(
            &Actor::user("alice"),
            &internal(f.room.id, date(2024, 1, 2), "10:00", "11:00"),
        )
        .unwrap();

    assert_eq!(booking.status(), BookingStatus::Approved);
    assert_eq!(booking.approved_at(), Some(at(2024, 1, 1, 8, 0)));
    assert_eq!(booking.user_id.as_str(), "alice");
    assert!(booking.series_id.is_none());
    assert_eq!(f.event_kinds(), vec!["booking_created", "booking_approved"]);
}

#[test]
fn external_booking_waits_for_approval() {
    let f = fixture();
    let booking = f
        .engine
        .create_booking(
            &Actor::user("bob"),
            &external(f.room.id, date(2024, 1, 2), "10:00", "11:00")
                .headcount(4)
                .food("vegetarian")
                .guests(["guest@example.com"]),
        )
        .unwrap();

    assert_eq!(booking.status(), BookingStatus::Pending);
    assert_eq!(booking.approved_at(), None);
    assert_eq!(booking.food_preference.as_deref(), Some("vegetarian"));
    assert_eq!(booking.guest_emails, vec!["guest@example.com".to_string()]);
    assert_eq!(f.engine.pending_count().unwrap(), 1);

    let events = f.sink.take();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), "booking_created");
    assert_eq!(events[0].recipient(), Recipient::Admins);
}

#[test]
fn creation_issues_distinct_checkin_tokens() {
    let f = fixture();
    let alice = Actor::user("alice");
    let day = date(2024, 1, 2);
    let a = f
        .engine
        .create_booking(&alice, &internal(f.room.id, day, "10:00", "11:00"))
        .unwrap();
    let b = f
        .engine
        .create_booking(&alice, &internal(f.room.id, day, "11:00", "12:00"))
        .unwrap();

    assert!(!a.checkin_token().is_empty());
    assert_ne!(a.checkin_token(), b.checkin_token());
}

#[test]
fn purpose_is_required() {
    let f = fixture();
    let mut request = internal(f.room.id, date(2024, 1, 2), "10:00", "11:00");
    request.purpose = "   ".to_string();
    let err = f
        .engine
        .create_booking(&Actor::user("alice"), &request)
        .unwrap_err();
    assert_eq!(err, BookingError::Validation("Purpose is required.".to_string()));
}

#[test]
fn external_food_needs_a_preference() {
    let f = fixture();
    let mut request = external(f.room.id, date(2024, 1, 2), "10:00", "11:00");
    request.food = true;
    let err = f
        .engine
        .create_booking(&Actor::user("bob"), &request)
        .unwrap_err();
    assert_eq!(err.code(), "validation");
}

#[test]
fn conflicting_creation_stores_nothing() {
    let f = fixture();
    let day = date(2024, 1, 2);
    f.engine
        .create_booking(&Actor::user("alice"), &internal(f.room.id, day, "10:00", "11:00"))
        .unwrap();
    f.sink.take();

    let err = f
        .engine
        .create_booking(&Actor::user("bob"), &internal(f.room.id, day, "10:30", "11:30"))
        .unwrap_err();

    assert_eq!(err.code(), "conflict");
    assert!(f.sink.take().is_empty());
    assert_eq!(f.engine.calendar(day, day).unwrap().len(), 1);
}

// ── Approval ────────────────────────────────────────────────────────────

#[test]
fn approval_cascades_to_overlapping_pending() {
    let f = fixture();
    let day = date(2024, 1, 2);
    let winner = f
        .engine
        .create_booking(&Actor::user("bob"), &external(f.room.id, day, "10:00", "11:00"))
        .unwrap();
    let loser = f
        .engine
        .create_booking(&Actor::user("carol"), &external(f.room.id, day, "10:30", "11:30"))
        .unwrap();
    let neighbour = f
        .engine
        .create_booking(&Actor::user("dave"), &external(f.room.id, day, "11:00", "12:00"))
        .unwrap();
    f.sink.take();

    let approval = f.engine.approve(&f.admin, &winner.id).unwrap();

    assert_eq!(approval.approved.status(), BookingStatus::Approved);
    assert_eq!(approval.auto_rejected.len(), 1);
    assert_eq!(approval.auto_rejected[0].id, loser.id);

    let loser = f.engine.booking(&f.admin, &loser.id).unwrap();
    assert_eq!(loser.status(), BookingStatus::Rejected);
    assert_eq!(loser.rejection_reason(), Some(CASCADE_REJECTION_REASON));

    let neighbour = f.engine.booking(&f.admin, &neighbour.id).unwrap();
    assert_eq!(neighbour.status(), BookingStatus::Pending);

    let events = f.sink.take();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind(), "booking_approved");
    assert!(matches!(
        &events[1],
        Event::BookingRejected { automatic: true, booking } if booking.id == loser.id
    ));
}

#[test]
fn second_approval_of_cascaded_loser_fails() {
    let f = fixture();
    let day = date(2024, 1, 2);
    let a = f
        .engine
        .create_booking(&Actor::user("bob"), &external(f.room.id, day, "10:00", "11:00"))
        .unwrap();
    let b = f
        .engine
        .create_booking(&Actor::user("carol"), &external(f.room.id, day, "10:00", "11:00"))
        .unwrap();

    f.engine.approve(&f.admin, &a.id).unwrap();
    let err = f.engine.approve(&f.admin, &b.id).unwrap_err();
    assert_eq!(violation(err), StateViolation::NotPending);
}

#[test]
fn approval_refuses_when_slot_was_taken_meanwhile() {
    let f = fixture();
    let day = date(2024, 1, 2);
    let pending = f
        .engine
        .create_booking(&Actor::user("bob"), &external(f.room.id, day, "10:00", "11:00"))
        .unwrap();
    f.engine
        .create_booking(&Actor::user("alice"), &internal(f.room.id, day, "10:30", "11:00"))
        .unwrap();

    let err = f.engine.approve(&f.admin, &pending.id).unwrap_err();
    assert_eq!(err.code(), "conflict");
    assert_eq!(
        f.engine.booking(&f.admin, &pending.id).unwrap().status(),
        BookingStatus::Pending
    );
}

#[test]
fn only_admins_approve_and_reject() {
    let f = fixture();
    let bob = Actor::user("bob");
    let booking = f
        .engine
        .create_booking(&bob, &external(f.room.id, date(2024, 1, 2), "10:00", "11:00"))
        .unwrap();

    assert_eq!(f.engine.approve(&bob, &booking.id).unwrap_err().code(), "unauthorized");
    assert_eq!(
        f.engine.reject(&bob, &booking.id, "no").unwrap_err().code(),
        "unauthorized"
    );
}

#[test]
fn approving_unknown_booking_is_not_found() {
    let f = fixture();
    let err = f
        .engine
        .approve(&f.admin, &room_engine::BookingId::new())
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

// ── Rejection ───────────────────────────────────────────────────────────

#[test]
fn rejection_requires_reason_and_records_it() {
    let f = fixture();
    let booking = f
        .engine
        .create_booking(
            &Actor::user("bob"),
            &external(f.room.id, date(2024, 1, 2), "10:00", "11:00"),
        )
        .unwrap();

    let err = f.engine.reject(&f.admin, &booking.id, "  ").unwrap_err();
    assert_eq!(err.code(), "validation");

    let rejected = f
        .engine
        .reject(&f.admin, &booking.id, "Room needed for board meeting")
        .unwrap();
    assert_eq!(rejected.status(), BookingStatus::Rejected);
    assert_eq!(
        rejected.rejection_reason(),
        Some("Room needed for board meeting")
    );
}

#[test]
fn approved_booking_cannot_be_rejected() {
    let f = fixture();
    let booking = f
        .engine
        .create_booking(
            &Actor::user("alice"),
            &internal(f.room.id, date(2024, 1, 2), "10:00", "11:00"),
        )
        .unwrap();

    let err = f.engine.reject(&f.admin, &booking.id, "late").unwrap_err();
    assert_eq!(violation(err), StateViolation::NotPending);
}

// ── Cancellation ────────────────────────────────────────────────────────

#[test]
fn owner_cancels_before_start() {
    let f = fixture();
    let alice = Actor::user("alice");
    let booking = f
        .engine
        .create_booking(&alice, &internal(f.room.id, date(2024, 1, 1), "10:00", "11:00"))
        .unwrap();
    f.sink.take();

    let cancelled = f.engine.cancel(&alice, &booking.id).unwrap();
    assert_eq!(cancelled.status(), BookingStatus::Cancelled);
    assert_eq!(f.event_kinds(), vec!["booking_cancelled"]);
}

#[test]
fn owner_cannot_cancel_after_start_but_admin_can() {
    let f = fixture();
    let alice = Actor::user("alice");
    let booking = f
        .engine
        .create_booking(&alice, &internal(f.room.id, date(2024, 1, 1), "10:00", "11:00"))
        .unwrap();
    f.clock.set(at(2024, 1, 1, 10, 0));

    let err = f.engine.cancel(&alice, &booking.id).unwrap_err();
    assert_eq!(err.code(), "meeting_started");

    let cancelled = f.engine.cancel(&f.admin, &booking.id).unwrap();
    assert_eq!(cancelled.status(), BookingStatus::Cancelled);
}

#[test]
fn strangers_cannot_cancel() {
    let f = fixture();
    let booking = f
        .engine
        .create_booking(
            &Actor::user("alice"),
            &internal(f.room.id, date(2024, 1, 2), "10:00", "11:00"),
        )
        .unwrap();

    let err = f.engine.cancel(&Actor::user("mallory"), &booking.id).unwrap_err();
    assert_eq!(err.code(), "unauthorized");
}

#[test]
fn terminal_bookings_are_not_cancellable() {
    let f = fixture();
    let bob = Actor::user("bob");
    let booking = f
        .engine
        .create_booking(&bob, &external(f.room.id, date(2024, 1, 2), "10:00", "11:00"))
        .unwrap();
    f.engine.reject(&f.admin, &booking.id, "full").unwrap();

    let err = f.engine.cancel(&bob, &booking.id).unwrap_err();
    assert_eq!(violation(err), StateViolation::NotCancellable);

    let other = f
        .engine
        .create_booking(&bob, &external(f.room.id, date(2024, 1, 2), "12:00", "13:00"))
        .unwrap();
    f.engine.cancel(&bob, &other.id).unwrap();
    let err = f.engine.cancel(&bob, &other.id).unwrap_err();
    assert_eq!(err.code(), "not_cancellable");
}

#[test]
fn cancelled_slot_can_be_rebooked() {
    let f = fixture();
    let day = date(2024, 1, 2);
    let alice = Actor::user("alice");
    let booking = f
        .engine
        .create_booking(&alice, &internal(f.room.id, day, "10:00", "11:00"))
        .unwrap();
    f.engine.cancel(&alice, &booking.id).unwrap();

    let rebooked = f
        .engine
        .create_booking(&Actor::user("bob"), &internal(f.room.id, day, "10:00", "11:00"))
        .unwrap();
    assert_eq!(rebooked.status(), BookingStatus::Approved);
}

// ── Queries ─────────────────────────────────────────────────────────────

#[test]
fn users_only_see_their_own_bookings() {
    let f = fixture();
    let day = date(2024, 1, 2);
    let alice = Actor::user("alice");
    let mine = f
        .engine
        .create_booking(&alice, &internal(f.room.id, day, "10:00", "11:00"))
        .unwrap();
    let theirs = f
        .engine
        .create_booking(&Actor::user("bob"), &external(f.room.id, day, "12:00", "13:00"))
        .unwrap();

    let visible = f.engine.bookings(&alice, &BookingFilter::default()).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, mine.id);
    assert_eq!(f.engine.booking(&alice, &theirs.id).unwrap_err().code(), "unauthorized");

    let all = f.engine.bookings(&f.admin, &BookingFilter::default()).unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn booking_filter_narrows_results() {
    let f = fixture();
    let alice = Actor::user("alice");
    f.engine
        .create_booking(&alice, &internal(f.room.id, date(2024, 1, 2), "10:00", "11:00"))
        .unwrap();
    f.engine
        .create_booking(&alice, &external(f.room.id, date(2024, 1, 3), "10:00", "11:00"))
        .unwrap();

    let pending = f
        .engine
        .bookings(
            &f.admin,
            &BookingFilter {
                status: Some(BookingStatus::Pending),
                ..BookingFilter::default()
            },
        )
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].meeting_kind, MeetingKind::External);

    let by_text = f
        .engine
        .bookings(
            &f.admin,
            &BookingFilter {
                text: Some("CLIENT".to_string()),
                ..BookingFilter::default()
            },
        )
        .unwrap();
    assert_eq!(by_text.len(), 1);

    // Newest first.
    let all = f.engine.bookings(&alice, &BookingFilter::default()).unwrap();
    assert_eq!(all[0].date, date(2024, 1, 3));
}

#[test]
fn calendar_lists_active_bookings_in_order() {
    let f = fixture();
    let alice = Actor::user("alice");
    let late = f
        .engine
        .create_booking(&alice, &internal(f.room.id, date(2024, 1, 3), "09:00", "10:00"))
        .unwrap();
    let early = f
        .engine
        .create_booking(&alice, &internal(f.room.id, date(2024, 1, 2), "15:00", "16:00"))
        .unwrap();
    let gone = f
        .engine
        .create_booking(&alice, &internal(f.room.id, date(2024, 1, 2), "09:00", "10:00"))
        .unwrap();
    f.engine.cancel(&alice, &gone.id).unwrap();

    let calendar = f.engine.calendar(date(2024, 1, 1), date(2024, 1, 7)).unwrap();
    let ids: Vec<_> = calendar.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![early.id, late.id]);
}

#[test]
fn approval_stamps_the_current_time() {
    let f = fixture();
    let booking = f
        .engine
        .create_booking(
            &Actor::user("bob"),
            &external(f.room.id, date(2024, 1, 2), "10:00", "11:00"),
        )
        .unwrap();
    f.clock.advance(Duration::minutes(90));

    let approval = f.engine.approve(&f.admin, &booking.id).unwrap();
    assert_eq!(approval.approved.approved_at(), Some(at(2024, 1, 1, 9, 30)));
}
