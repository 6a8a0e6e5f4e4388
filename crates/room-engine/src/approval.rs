//! Approval with conflict cascade, and rejection.
//!
//! Approving pending booking B is one atomic unit: B becomes approved, and
//! every other pending booking in the same room and date overlapping B is
//! rejected with [`CASCADE_REJECTION_REASON`]. Only pending bookings are
//! touched and B is no longer pending, so the cascade is a single pass bounded
//! by the pending bookings of that room-day. Among competing pending requests
//! the first one approved wins.
//!
//! A loser may reach past the winner's range. Whatever part of its slot is
//! still free of approved bookings is offered to the waitlist in the same
//! transaction.

use serde::{Deserialize, Serialize};

use crate::conflict::TimeRange;
use crate::error::{BookingError, Result, StateViolation};
use crate::events::Event;
use crate::freebusy::find_free_slots;
use crate::model::{Actor, Booking, BookingId, BookingStatus, WaitlistEntry};
use crate::slot::{approved_overlap, conflict_with};
use crate::store::Store;
use crate::waitlist::match_waitlist;
use crate::Engine;

/// Reason recorded on pending bookings rejected by an approval cascade.
pub const CASCADE_REJECTION_REASON: &str = "slot taken by another approved booking";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub approved: Booking,
    /// Competing pending bookings rejected by the cascade.
    pub auto_rejected: Vec<Booking>,
}

impl<S: Store> Engine<S> {
    /// Approve a pending booking, reject the pending bookings it beats and
    /// offer their still-free time to the waitlist.
    ///
    /// # Errors
    /// `Unauthorized` for non-admins, `NotFound` for an unknown id, `State`
    /// (`not_pending`) if the booking is not pending, and `Conflict` if an
    /// approved booking already holds an overlapping slot.
    pub fn approve(&self, actor: &Actor, id: &BookingId) -> Result<Approval> {
        actor.require_admin("approve bookings")?;
        let now = self.now();

        let (approval, notified) = self.store.transact(|ledger| {
            let booking = ledger
                .booking(id)
                .ok_or_else(|| BookingError::not_found("booking", id))?;
            if booking.status() != BookingStatus::Pending {
                return Err(BookingError::state(
                    StateViolation::NotPending,
                    "Booking is not pending.",
                ));
            }
            let (room, date, range) = (booking.room_id, booking.date, booking.range());
            // An internal booking may have been auto-approved over this request
            // after it was filed.
            if let Some(existing) = approved_overlap(ledger, room, date, range, Some(*id)) {
                return Err(conflict_with(existing));
            }

            let approved = ledger.booking_mut(id)?;
            approved.approve(now)?;
            let approved = approved.clone();

            let losers: Vec<BookingId> = ledger
                .bookings_with_status(room, date, BookingStatus::Pending)
                .filter(|b| b.range().overlaps(&range))
                .map(|b| b.id)
                .collect();
            let mut auto_rejected = Vec::with_capacity(losers.len());
            for loser in &losers {
                let booking = ledger.booking_mut(loser)?;
                booking.reject(CASCADE_REJECTION_REASON)?;
                auto_rejected.push(booking.clone());
            }

            let busy: Vec<TimeRange> = ledger
                .bookings_with_status(room, date, BookingStatus::Approved)
                .map(Booking::range)
                .collect();
            let mut notified: Vec<WaitlistEntry> = Vec::new();
            for loser in &auto_rejected {
                for free in find_free_slots(&busy, loser.range()) {
                    let freed = TimeRange::new(free.start, free.end);
                    notified.extend(match_waitlist(ledger, room, date, freed));
                }
            }

            Ok((
                Approval {
                    approved,
                    auto_rejected,
                },
                notified,
            ))
        })?;

        tracing::info!(
            booking = %approval.approved.id,
            auto_rejected = approval.auto_rejected.len(),
            notified = notified.len(),
            "booking approved"
        );

        let mut events = vec![Event::BookingApproved {
            booking: approval.approved.clone(),
        }];
        events.extend(
            approval
                .auto_rejected
                .iter()
                .map(|booking| Event::BookingRejected {
                    booking: booking.clone(),
                    automatic: true,
                }),
        );
        events.extend(
            notified
                .into_iter()
                .map(|entry| Event::SlotAvailable { entry }),
        );
        self.emit(events);

        Ok(approval)
    }

    /// Reject a pending booking with a reason, then offer its slot to the
    /// waitlist.
    ///
    /// # Errors
    /// `Unauthorized` for non-admins, `Validation` for an empty reason,
    /// `NotFound` for an unknown id, `State` (`not_pending`) otherwise.
    pub fn reject(&self, actor: &Actor, id: &BookingId, reason: &str) -> Result<Booking> {
        actor.require_admin("reject bookings")?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(BookingError::Validation(
                "Rejection reason required.".to_string(),
            ));
        }

        let (rejected, notified) = self.store.transact(|ledger| {
            let booking = ledger.booking_mut(id)?;
            booking.reject(reason)?;
            let rejected = booking.clone();
            let notified = match_waitlist(ledger, rejected.room_id, rejected.date, rejected.range());
            Ok((rejected, notified))
        })?;

        tracing::info!(booking = %rejected.id, %reason, "booking rejected");

        let mut events = vec![Event::BookingRejected {
            booking: rejected.clone(),
            automatic: false,
        }];
        events.extend(
            notified
                .into_iter()
                .map(|entry| Event::SlotAvailable { entry }),
        );
        self.emit(events);

        Ok(rejected)
    }
}
