//! Records held by the booking store and the requests that create them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conflict::TimeRange;
use crate::error::{BookingError, Result};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                $name(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = BookingError;

            fn from_str(s: &str) -> Result<Self> {
                Uuid::parse_str(s.trim()).map($name).map_err(|_| {
                    BookingError::Validation(format!(
                        concat!("Invalid ", stringify!($name), ": '{}'"),
                        s
                    ))
                })
            }
        }
    };
}

uuid_id!(
    /// Identity of a booking.
    BookingId
);
uuid_id!(
    /// Identity of a room.
    RoomId
);
uuid_id!(
    /// Shared by every occurrence created from one recurring request.
    SeriesId
);
uuid_id!(
    /// Identity of a waitlist entry.
    WaitlistId
);

/// Opaque reference to a user owned by the external identity system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The party performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Actor {
    pub fn user(id: impl Into<String>) -> Self {
        Actor {
            user_id: UserId::new(id),
            is_admin: false,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Actor {
            user_id: UserId::new(id),
            is_admin: true,
        }
    }

    /// Admins manage everything; users manage what they own.
    pub fn can_manage(&self, owner: &UserId) -> bool {
        self.is_admin || &self.user_id == owner
    }

    pub(crate) fn require_admin(&self, action: &str) -> Result<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(BookingError::Unauthorized(format!(
                "admin access required to {action}"
            )))
        }
    }

    pub(crate) fn require_manage(&self, owner: &UserId, what: &str) -> Result<()> {
        if self.can_manage(owner) {
            Ok(())
        } else {
            Err(BookingError::Unauthorized(format!(
                "{} does not own this {what}",
                self.user_id
            )))
        }
    }
}

/// Meeting classification. Decides the initial status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingKind {
    /// Trusted; auto-approved.
    Internal,
    /// Visitor/catering logistics; requires admin approval.
    External,
}

impl MeetingKind {
    pub fn initial_status(self) -> BookingStatus {
        match self {
            MeetingKind::Internal => BookingStatus::Approved,
            MeetingKind::External => BookingStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Rejected | BookingStatus::Cancelled)
    }

    /// Whether `self → next` is an edge of the status lattice.
    ///
    /// pending → approved | rejected | cancelled, approved → cancelled.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Approved)
                | (BookingStatus::Pending, BookingStatus::Rejected)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Approved, BookingStatus::Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub capacity: u32,
    pub max_duration_minutes: u32,
    pub blocked: bool,
    #[serde(default)]
    pub floor: String,
    #[serde(default)]
    pub amenities: Vec<String>,
}

/// Fields for creating a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSpec {
    pub name: String,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default = "default_max_duration")]
    pub max_duration_minutes: u32,
    #[serde(default)]
    pub floor: String,
    #[serde(default)]
    pub amenities: Vec<String>,
}

fn default_capacity() -> u32 {
    10
}

fn default_max_duration() -> u32 {
    240
}

impl RoomSpec {
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        RoomSpec {
            name: name.into(),
            capacity,
            max_duration_minutes: default_max_duration(),
            floor: String::new(),
            amenities: Vec::new(),
        }
    }

    pub fn max_duration(mut self, minutes: u32) -> Self {
        self.max_duration_minutes = minutes;
        self
    }
}

/// Partial update of a room; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomPatch {
    pub name: Option<String>,
    pub capacity: Option<u32>,
    pub max_duration_minutes: Option<u32>,
    pub floor: Option<String>,
    pub amenities: Option<Vec<String>>,
    pub blocked: Option<bool>,
}

/// A reservation of one room on one civil date.
///
/// Status and the one-way latches are private: they change only through the
/// dedicated transition methods, never by field assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub room_id: RoomId,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    pub meeting_kind: MeetingKind,
    pub purpose: String,
    pub headcount: Option<u32>,
    pub food: bool,
    pub food_preference: Option<String>,
    pub remarks: String,
    pub guest_emails: Vec<String>,
    pub series_id: Option<SeriesId>,
    pub created_at: DateTime<Utc>,
    status: BookingStatus,
    rejection_reason: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    checkin_token: String,
    checked_in_at: Option<DateTime<Utc>>,
    reminder_sent: bool,
}

impl Booking {
    pub(crate) fn new(
        user_id: UserId,
        slot: &ParsedRequest,
        series_id: Option<SeriesId>,
        checkin_token: String,
        now: DateTime<Utc>,
    ) -> Self {
        let status = slot.request.meeting_kind.initial_status();
        Booking {
            id: BookingId::new(),
            user_id,
            room_id: slot.request.room_id,
            date: slot.date,
            start: slot.start,
            end: slot.end,
            meeting_kind: slot.request.meeting_kind,
            purpose: slot.request.purpose.trim().to_string(),
            headcount: slot.request.headcount,
            food: slot.request.food,
            food_preference: slot.request.food_preference.clone(),
            remarks: slot.request.remarks.clone(),
            guest_emails: slot.request.guest_emails.clone(),
            series_id,
            created_at: now,
            status,
            rejection_reason: None,
            approved_at: (status == BookingStatus::Approved).then_some(now),
            checkin_token,
            checked_in_at: None,
            reminder_sent: false,
        }
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    /// Present exactly when the booking is rejected.
    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    /// The single-use check-in capability. Never changes after creation.
    pub fn checkin_token(&self) -> &str {
        &self.checkin_token
    }

    pub fn checked_in_at(&self) -> Option<DateTime<Utc>> {
        self.checked_in_at
    }

    pub fn reminder_sent(&self) -> bool {
        self.reminder_sent
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }

    fn transition(&mut self, next: BookingStatus) -> Result<()> {
        if self.status.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }
        let violation = if next == BookingStatus::Cancelled {
            crate::error::StateViolation::NotCancellable
        } else {
            crate::error::StateViolation::NotPending
        };
        Err(BookingError::state(
            violation,
            format!("Cannot move booking {} from {} to {}", self.id, self.status, next),
        ))
    }

    pub(crate) fn approve(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.transition(BookingStatus::Approved)?;
        self.approved_at = Some(at);
        Ok(())
    }

    pub(crate) fn reject(&mut self, reason: &str) -> Result<()> {
        self.transition(BookingStatus::Rejected)?;
        self.rejection_reason = Some(reason.to_string());
        Ok(())
    }

    pub(crate) fn cancel(&mut self) -> Result<()> {
        self.transition(BookingStatus::Cancelled)
    }

    /// Sets `checked_in_at` if unset. Returns `false` when it was already set.
    pub(crate) fn latch_check_in(&mut self, at: DateTime<Utc>) -> bool {
        if self.checked_in_at.is_some() {
            return false;
        }
        self.checked_in_at = Some(at);
        true
    }

    /// Sets `reminder_sent`. Returns `false` when it was already set.
    pub(crate) fn latch_reminder(&mut self) -> bool {
        !std::mem::replace(&mut self.reminder_sent, true)
    }
}

/// A request to create one booking (or the base of a series).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub room_id: RoomId,
    pub date: NaiveDate,
    /// `HH:MM`
    pub start: String,
    /// `HH:MM`
    pub end: String,
    pub meeting_kind: MeetingKind,
    pub purpose: String,
    #[serde(default)]
    pub headcount: Option<u32>,
    #[serde(default)]
    pub food: bool,
    #[serde(default)]
    pub food_preference: Option<String>,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub guest_emails: Vec<String>,
}

impl BookingRequest {
    pub fn new(
        room_id: RoomId,
        date: NaiveDate,
        start: &str,
        end: &str,
        meeting_kind: MeetingKind,
        purpose: &str,
    ) -> Self {
        BookingRequest {
            room_id,
            date,
            start: start.to_string(),
            end: end.to_string(),
            meeting_kind,
            purpose: purpose.to_string(),
            headcount: None,
            food: false,
            food_preference: None,
            remarks: String::new(),
            guest_emails: Vec::new(),
        }
    }

    pub fn headcount(mut self, persons: u32) -> Self {
        self.headcount = Some(persons);
        self
    }

    pub fn food(mut self, preference: &str) -> Self {
        self.food = true;
        self.food_preference = Some(preference.to_string());
        self
    }

    pub fn guests<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guest_emails = emails.into_iter().map(Into::into).collect();
        self
    }

    /// Shape checks that do not depend on the store.
    pub(crate) fn parse(&self) -> Result<ParsedRequest> {
        if self.purpose.trim().is_empty() {
            return Err(BookingError::Validation("Purpose is required.".to_string()));
        }
        if self.meeting_kind == MeetingKind::External
            && self.food
            && self
                .food_preference
                .as_deref()
                .is_none_or(|p| p.trim().is_empty())
        {
            return Err(BookingError::Validation(
                "Food preference required when food is requested.".to_string(),
            ));
        }
        if self.headcount == Some(0) {
            return Err(BookingError::Validation(
                "Headcount must be positive.".to_string(),
            ));
        }
        let start = parse_time(&self.start)?;
        let end = parse_time(&self.end)?;
        Ok(ParsedRequest {
            request: self.clone(),
            date: self.date,
            start,
            end,
        })
    }
}

/// A request whose times have been parsed. `date` may differ from the
/// request's base date for recurring occurrences.
#[derive(Debug, Clone)]
pub(crate) struct ParsedRequest {
    pub request: BookingRequest,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ParsedRequest {
    pub fn on(&self, date: NaiveDate) -> ParsedRequest {
        ParsedRequest {
            date,
            ..self.clone()
        }
    }
}

/// How a creation request repeats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
}

/// A creation request that may expand into a series of occurrences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRequest {
    #[serde(flatten)]
    pub booking: BookingRequest,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default)]
    pub until: Option<NaiveDate>,
}

/// A user's wish to be told when an overlapping slot frees up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: WaitlistId,
    pub user_id: UserId,
    pub room_id: RoomId,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    pub purpose: String,
    pub created_at: DateTime<Utc>,
    sequence: u64,
    notified: bool,
}

impl WaitlistEntry {
    pub(crate) fn new(
        user_id: UserId,
        room_id: RoomId,
        date: NaiveDate,
        range: TimeRange,
        purpose: String,
        created_at: DateTime<Utc>,
        sequence: u64,
    ) -> Self {
        WaitlistEntry {
            id: WaitlistId::new(),
            user_id,
            room_id,
            date,
            start: range.start,
            end: range.end,
            purpose,
            created_at,
            sequence,
            notified: false,
        }
    }

    pub fn notified(&self) -> bool {
        self.notified
    }

    /// Arrival order; lower arrived earlier.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }

    /// Sets `notified`. Returns `false` when it was already set.
    pub(crate) fn latch_notified(&mut self) -> bool {
        !std::mem::replace(&mut self.notified, true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitlistRequest {
    pub room_id: RoomId,
    pub date: NaiveDate,
    pub start: String,
    pub end: String,
    pub purpose: String,
}

/// Parse a minute-granularity `HH:MM` time of day.
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| BookingError::Validation(format!("Invalid time '{s}' (expected HH:MM).")))
}

/// Serde adapter storing a `NaiveTime` as `HH:MM`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format("%H:%M"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}
