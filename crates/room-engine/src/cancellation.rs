//! Cancelling single bookings and whole recurring series.
//!
//! Owners and admins may cancel pending or approved bookings. Owners lose that
//! right once the meeting has started; admins never do. Every cancellation
//! offers the freed slot to the waitlist in the same transaction.

use crate::error::{BookingError, Result, StateViolation};
use crate::events::Event;
use crate::model::{Actor, Booking, BookingId, WaitlistEntry};
use crate::store::Store;
use crate::waitlist::match_waitlist;
use crate::Engine;

impl<S: Store> Engine<S> {
    /// Cancel one booking.
    ///
    /// # Errors
    /// `NotFound`, `Unauthorized` for someone else's booking, `State`
    /// (`not_cancellable`) for rejected/cancelled bookings, and `State`
    /// (`meeting_started`) when a non-admin cancels after the start.
    pub fn cancel(&self, actor: &Actor, id: &BookingId) -> Result<Booking> {
        let now = self.local_now();

        let (cancelled, notified) = self.store.transact(|ledger| {
            let booking = ledger.booking_mut(id)?;
            actor.require_manage(&booking.user_id, "booking")?;
            if booking.status().is_terminal() {
                return Err(BookingError::state(
                    StateViolation::NotCancellable,
                    "Cannot cancel this booking.",
                ));
            }
            if !actor.is_admin && now >= booking.date.and_time(booking.start) {
                return Err(BookingError::state(
                    StateViolation::MeetingStarted,
                    "Meeting already started.",
                ));
            }
            booking.cancel()?;
            let cancelled = booking.clone();
            let notified =
                match_waitlist(ledger, cancelled.room_id, cancelled.date, cancelled.range());
            Ok((cancelled, notified))
        })?;

        tracing::info!(booking = %cancelled.id, by = %actor.user_id, "booking cancelled");
        self.emit(cancellation_events(vec![cancelled.clone()], notified));
        Ok(cancelled)
    }

    /// Cancel every upcoming pending or approved occurrence of the series `id`
    /// belongs to. Occurrences that already started are kept unless the actor
    /// is an admin.
    ///
    /// # Errors
    /// `NotFound`, `Unauthorized`, or `State` (`not_recurring`) when the
    /// booking is not part of a series.
    pub fn cancel_series(&self, actor: &Actor, id: &BookingId) -> Result<Vec<Booking>> {
        let now = self.local_now();
        let today = now.date();

        let (cancelled, notified) = self.store.transact(|ledger| {
            let booking = ledger
                .booking(id)
                .ok_or_else(|| BookingError::not_found("booking", id))?;
            actor.require_manage(&booking.user_id, "booking")?;
            let series = booking.series_id.ok_or_else(|| {
                BookingError::state(StateViolation::NotRecurring, "Not a recurring booking.")
            })?;

            let mut targets: Vec<&Booking> = ledger
                .bookings()
                .filter(|b| {
                    b.series_id == Some(series)
                        && !b.status().is_terminal()
                        && b.date >= today
                        && (actor.is_admin || now < b.date.and_time(b.start))
                })
                .collect();
            targets.sort_by_key(|b| (b.date, b.start));
            let targets: Vec<BookingId> = targets.into_iter().map(|b| b.id).collect();

            let mut cancelled = Vec::with_capacity(targets.len());
            let mut notified = Vec::new();
            for target in &targets {
                let booking = ledger.booking_mut(target)?;
                booking.cancel()?;
                let booking = booking.clone();
                notified.extend(match_waitlist(
                    ledger,
                    booking.room_id,
                    booking.date,
                    booking.range(),
                ));
                cancelled.push(booking);
            }
            Ok((cancelled, notified))
        })?;

        tracing::info!(
            booking = %id,
            occurrences = cancelled.len(),
            "series cancelled"
        );
        self.emit(cancellation_events(cancelled.clone(), notified));
        Ok(cancelled)
    }
}

fn cancellation_events(cancelled: Vec<Booking>, notified: Vec<WaitlistEntry>) -> Vec<Event> {
    cancelled
        .into_iter()
        .map(|booking| Event::BookingCancelled { booking })
        .chain(notified.into_iter().map(|entry| Event::SlotAvailable { entry }))
        .collect()
}
