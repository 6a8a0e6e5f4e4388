//! Transition events for external notification and calendar adapters.
//!
//! The core only reports *that* something happened and *who* must be told.
//! Delivery is the sink's business: [`EventSink::publish`] is fire-and-forget
//! from the engine's point of view, and a failing sink never fails a booking.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Booking, UserId, WaitlistEntry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// A booking was recorded. Carries the freshly issued check-in token.
    BookingCreated { booking: Booking },
    /// A booking entered `approved`. Also the calendar-sync trigger.
    BookingApproved { booking: Booking },
    /// `automatic` marks rejections made by an approval cascade.
    BookingRejected { booking: Booking, automatic: bool },
    BookingCancelled { booking: Booking },
    /// A freed slot overlaps the entry's desired window.
    SlotAvailable { entry: WaitlistEntry },
}

/// Who an event is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Admins,
    User(UserId),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::BookingCreated { .. } => "booking_created",
            Event::BookingApproved { .. } => "booking_approved",
            Event::BookingRejected { .. } => "booking_rejected",
            Event::BookingCancelled { .. } => "booking_cancelled",
            Event::SlotAvailable { .. } => "slot_available",
        }
    }

    pub fn recipient(&self) -> Recipient {
        match self {
            Event::BookingCreated { .. } => Recipient::Admins,
            Event::BookingApproved { booking }
            | Event::BookingRejected { booking, .. }
            | Event::BookingCancelled { booking } => Recipient::User(booking.user_id.clone()),
            Event::SlotAvailable { entry } => Recipient::User(entry.user_id.clone()),
        }
    }
}

#[derive(Error, Debug)]
#[error("event sink failed: {0}")]
pub struct SinkError(pub String);

pub trait EventSink: Send + Sync {
    fn publish(&self, event: &Event) -> Result<(), SinkError>;
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: &Event) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Writes every event to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn publish(&self, event: &Event) -> Result<(), SinkError> {
        let recipient = match event.recipient() {
            Recipient::Admins => "admins".to_string(),
            Recipient::User(user) => user.to_string(),
        };
        tracing::info!(kind = event.kind(), %recipient, "event");
        Ok(())
    }
}

/// Keeps every published event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: &Event) -> Result<(), SinkError> {
        self.events
            .lock()
            .map_err(|_| SinkError("recording sink poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}
