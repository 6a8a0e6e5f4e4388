//! Query interface for the external reminder scanner.
//!
//! The scanner polls [`Engine::due_reminders`], delivers reminders however it
//! likes, and calls [`Engine::mark_reminder_sent`] so that no booking is
//! reminded twice.

use chrono::Duration;

use crate::error::Result;
use crate::model::{Booking, BookingId, BookingStatus};
use crate::store::Store;
use crate::Engine;

impl<S: Store> Engine<S> {
    /// Approved, not yet reminded bookings starting within the next
    /// `reminder_lead_minutes`, earliest first.
    pub fn due_reminders(&self) -> Result<Vec<Booking>> {
        let now = self.local_now();
        let horizon = now + Duration::minutes(i64::from(self.settings.reminder_lead_minutes));
        let mut due: Vec<Booking> = self.store.read(|ledger| {
            ledger
                .bookings()
                .filter(|b| b.status() == BookingStatus::Approved && !b.reminder_sent())
                .filter(|b| {
                    let start = b.date.and_time(b.start);
                    start >= now && start <= horizon
                })
                .cloned()
                .collect()
        })?;
        due.sort_by_key(|b| (b.date, b.start));
        Ok(due)
    }

    /// Latch the reminder flag. Returns `false` if it was already set.
    ///
    /// # Errors
    /// `NotFound` for an unknown booking.
    pub fn mark_reminder_sent(&self, id: &BookingId) -> Result<bool> {
        let flipped = self
            .store
            .transact(|ledger| Ok(ledger.booking_mut(id)?.latch_reminder()))?;
        tracing::debug!(booking = %id, flipped, "reminder latched");
        Ok(flipped)
    }
}
