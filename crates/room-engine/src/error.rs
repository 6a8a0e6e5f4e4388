//! Error types for booking operations.
//!
//! Every variant maps to a stable reason code via [`BookingError::code`] so that
//! callers (HTTP adapters, the CLI) can branch on the kind of failure without
//! parsing messages. Nothing here is retried internally.

use chrono::NaiveTime;
use thiserror::Error;

use crate::model::{BookingId, UserId};

/// The kind of illegal state transition that was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateViolation {
    /// Approve/reject on a booking that is not pending.
    NotPending,
    /// Cancel on a booking that is already rejected or cancelled.
    NotCancellable,
    /// A non-admin tried to cancel after the meeting began.
    MeetingStarted,
    /// Check-in on a booking that is not approved.
    NotApproved,
    /// Check-in before the window opens.
    CheckInTooEarly,
    /// Check-in after the meeting ended.
    CheckInClosed,
    /// Series cancellation on a booking without a series.
    NotRecurring,
    /// Room deletion while bookings or waitlist entries reference it.
    RoomInUse,
}

impl StateViolation {
    pub fn code(self) -> &'static str {
        match self {
            StateViolation::NotPending => "not_pending",
            StateViolation::NotCancellable => "not_cancellable",
            StateViolation::MeetingStarted => "meeting_started",
            StateViolation::NotApproved => "not_approved",
            StateViolation::CheckInTooEarly => "checkin_too_early",
            StateViolation::CheckInClosed => "checkin_closed",
            StateViolation::NotRecurring => "not_recurring",
            StateViolation::RoomInUse => "room_in_use",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingError {
    /// Malformed or rule-violating request. Always caller-fixable.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The slot is already consumed by an approved booking.
    #[error(
        "Time slot already booked ({from}–{to}) by {owner}. Please choose a different slot.",
        from = .start.format("%H:%M"),
        to = .end.format("%H:%M")
    )]
    Conflict {
        booking_id: BookingId,
        owner: UserId,
        start: NaiveTime,
        end: NaiveTime,
    },

    /// The user already holds a waitlist entry for the identical slot.
    #[error("Already on the waitlist for this slot")]
    AlreadyWaitlisted,

    #[error("{message}")]
    State {
        violation: StateViolation,
        message: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Unauthorized(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl BookingError {
    pub(crate) fn state(violation: StateViolation, message: impl Into<String>) -> Self {
        BookingError::State {
            violation,
            message: message.into(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        BookingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "validation",
            BookingError::Conflict { .. } => "conflict",
            BookingError::AlreadyWaitlisted => "already_waitlisted",
            BookingError::State { violation, .. } => violation.code(),
            BookingError::NotFound { .. } => "not_found",
            BookingError::Unauthorized(_) => "unauthorized",
            BookingError::Store(_) => "store",
        }
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;
