//! Token-based check-in.
//!
//! Each booking carries one random, unguessable token issued at creation. The
//! token is the only credential: whoever presents it may look the booking up
//! and check in, once, between `start - checkin_early_minutes` and `end`.

use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{BookingError, Result, StateViolation};
use crate::model::{Booking, BookingStatus};
use crate::store::Store;
use crate::Engine;

/// Outcome of presenting a check-in token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
    /// `false` when the booking had already been checked in.
    pub first_time: bool,
    /// The original check-in instant.
    pub checked_in_at: DateTime<Utc>,
    pub booking: Booking,
}

/// Generate a 256-bit random token encoded as base64url (43 characters).
pub(crate) fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let mut random_bytes = [0u8; 32];
    rng.fill_bytes(&mut random_bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
}

impl<S: Store> Engine<S> {
    /// Resolve a check-in token. No credentials beyond the token are needed.
    ///
    /// # Errors
    /// `NotFound` ("invalid check-in link") for an unknown token.
    pub fn lookup_by_token(&self, token: &str) -> Result<Booking> {
        self.store
            .read(|ledger| ledger.booking_by_token(token).cloned())?
            .ok_or_else(invalid_link)
    }

    /// Check in with a token.
    ///
    /// A repeated check-in is not an error: it returns `first_time: false`
    /// with the original timestamp.
    ///
    /// # Errors
    /// `NotFound` for an unknown token; `State` with `checkin_too_early`,
    /// `checkin_closed` or `not_approved` when the window or status forbids it.
    pub fn check_in(&self, token: &str) -> Result<CheckIn> {
        let now = self.now();
        let local_now = self.local_now();
        let early = Duration::minutes(i64::from(self.settings.checkin_early_minutes));

        let outcome = self.store.transact(|ledger| {
            let id = ledger
                .booking_by_token(token)
                .map(|b| b.id)
                .ok_or_else(invalid_link)?;
            let booking = ledger.booking_mut(&id)?;

            if let Some(at) = booking.checked_in_at() {
                return Ok(CheckIn {
                    first_time: false,
                    checked_in_at: at,
                    booking: booking.clone(),
                });
            }

            let start = booking.date.and_time(booking.start);
            let end = booking.date.and_time(booking.end);
            if local_now < start - early {
                return Err(BookingError::state(
                    StateViolation::CheckInTooEarly,
                    format!(
                        "Too early: check-in opens at {} ({} min before start).",
                        (start - early).format("%H:%M"),
                        early.num_minutes()
                    ),
                ));
            }
            if local_now > end {
                return Err(BookingError::state(
                    StateViolation::CheckInClosed,
                    format!("Meeting ended at {}.", end.format("%H:%M")),
                ));
            }
            if booking.status() != BookingStatus::Approved {
                return Err(BookingError::state(
                    StateViolation::NotApproved,
                    "Booking is not approved.",
                ));
            }

            booking.latch_check_in(now);
            Ok(CheckIn {
                first_time: true,
                checked_in_at: now,
                booking: booking.clone(),
            })
        })?;

        if outcome.first_time {
            tracing::info!(booking = %outcome.booking.id, "checked in");
        } else {
            tracing::debug!(booking = %outcome.booking.id, "repeated check-in");
        }
        Ok(outcome)
    }
}

fn invalid_link() -> BookingError {
    BookingError::not_found("booking", "invalid check-in link")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_long_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
