//! # room-engine
//!
//! Booking lifecycle and conflict-resolution core for shared meeting rooms.
//!
//! Many independent actors compete for a finite set of rooms. The engine
//! guarantees that, per room and date, approved bookings never overlap, even
//! under concurrent requests, and reports every state transition as an
//! [`Event`] for external notification and calendar adapters.
//!
//! ## Modules
//!
//! - [`slot`]: Slot validation rules, first failure wins
//! - [`conflict`]: Half-open overlap on time-of-day ranges
//! - [`expander`]: Daily/weekly recurrence → concrete dates
//! - [`engine`]: Creation, recurring series, queries, room administration
//! - [`approval`]: Approval with conflict cascade, rejection
//! - [`cancellation`]: Single and series cancellation
//! - [`checkin`]: Token-based check-in window
//! - [`waitlist`]: Waitlist registration and freed-slot matching
//! - [`reminder`]: Query interface for reminder scanners
//! - [`availability`] / [`freebusy`]: Per-room hourly grid and free gaps
//! - [`store`]: Ledger tables and the atomic `Store` primitive
//! - [`events`]: Transition events and sinks
//! - [`settings`] / [`clock`]: Configuration and time source
//! - [`error`]: Error types with stable reason codes

pub mod approval;
pub mod availability;
pub mod cancellation;
pub mod checkin;
pub mod clock;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod events;
pub mod expander;
pub mod freebusy;
pub mod model;
pub mod reminder;
pub mod settings;
pub mod slot;
pub mod store;
pub mod waitlist;

pub use approval::{Approval, CASCADE_REJECTION_REASON};
pub use availability::RoomAvailability;
pub use checkin::CheckIn;
pub use clock::{Clock, FixedClock, SystemClock};
pub use conflict::TimeRange;
pub use engine::{BookingFilter, Engine, SeriesOutcome};
pub use error::{BookingError, StateViolation};
pub use events::{Event, EventSink, LogSink, NullSink, RecordingSink, Recipient, SinkError};
pub use model::{
    Actor, Booking, BookingId, BookingRequest, BookingStatus, MeetingKind, Recurrence, Room,
    RoomId, RoomPatch, RoomSpec, SeriesId, SeriesRequest, UserId, WaitlistEntry, WaitlistId,
    WaitlistRequest,
};
pub use settings::Settings;
pub use slot::{validate_slot, SlotQuery};
pub use store::{Ledger, MemoryStore, Store};
