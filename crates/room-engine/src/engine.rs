//! The booking engine: creation, recurring series, queries and room
//! administration. Approval, cancellation, check-in, waitlist and reminder
//! operations live in their own modules as further `impl` blocks.
//!
//! Every state change is one [`Store::transact`] call. Events are published
//! after the transaction commits, and a failing sink is only logged.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::availability::{self, RoomAvailability};
use crate::checkin::generate_token;
use crate::clock::{Clock, SystemClock};
use crate::conflict::TimeRange;
use crate::error::{BookingError, Result, StateViolation};
use crate::events::{Event, EventSink, LogSink};
use crate::expander::expand_series;
use crate::freebusy::{self, FreeSlot};
use crate::model::{
    Actor, Booking, BookingId, BookingRequest, BookingStatus, MeetingKind, ParsedRequest,
    Recurrence, Room, RoomId, RoomPatch, RoomSpec, SeriesId, SeriesRequest,
};
use crate::settings::Settings;
use crate::slot::{self, check_slot, Slot, SlotQuery};
use crate::store::Store;

/// Result of a (possibly recurring) creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesOutcome {
    /// Shared by all occurrences; absent for a plain single booking.
    pub series_id: Option<SeriesId>,
    /// Created occurrences, base date first.
    pub created: Vec<Booking>,
    /// Number of dates the request expanded to.
    pub requested_count: usize,
    /// Dates skipped because the occurrence failed validation.
    pub skipped_dates: Vec<NaiveDate>,
    /// The series hit `max_series_occurrences` before reaching `until`.
    #[serde(default)]
    pub truncated: bool,
}

impl SeriesOutcome {
    pub fn created_ids(&self) -> Vec<BookingId> {
        self.created.iter().map(|b| b.id).collect()
    }
}

/// Filter for [`Engine::bookings`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingFilter {
    pub room_id: Option<RoomId>,
    pub status: Option<BookingStatus>,
    pub meeting_kind: Option<MeetingKind>,
    pub date: Option<NaiveDate>,
    /// Case-insensitive substring of the purpose or the owner id.
    pub text: Option<String>,
}

impl BookingFilter {
    fn matches(&self, booking: &Booking) -> bool {
        self.room_id.is_none_or(|r| booking.room_id == r)
            && self.status.is_none_or(|s| booking.status() == s)
            && self.meeting_kind.is_none_or(|k| booking.meeting_kind == k)
            && self.date.is_none_or(|d| booking.date == d)
            && self.text.as_deref().is_none_or(|needle| {
                let needle = needle.to_lowercase();
                booking.purpose.to_lowercase().contains(&needle)
                    || booking.user_id.as_str().to_lowercase().contains(&needle)
            })
    }
}

pub struct Engine<S> {
    pub(crate) store: S,
    pub(crate) settings: Settings,
    tz: Tz,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
}

impl<S: Store> Engine<S> {
    /// Create an engine on the system clock, publishing events to the log.
    ///
    /// # Errors
    /// Returns `BookingError::Validation` if the settings are inconsistent.
    pub fn new(store: S, settings: Settings) -> Result<Self> {
        settings.validate()?;
        let tz = settings.tz()?;
        Ok(Engine {
            store,
            settings,
            tz,
            clock: Arc::new(SystemClock),
            sink: Arc::new(LogSink),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Civil date-time in the configured timezone.
    pub(crate) fn local_now(&self) -> NaiveDateTime {
        self.clock.now().with_timezone(&self.tz).naive_local()
    }

    /// Current civil date in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        self.local_now().date()
    }

    pub(crate) fn emit(&self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            if let Err(err) = self.sink.publish(&event) {
                tracing::warn!(kind = event.kind(), error = %err, "dropping event");
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Validation and creation
    // ─────────────────────────────────────────────────────────────────────

    /// Check a candidate slot without booking it.
    ///
    /// # Errors
    /// See [`slot::validate_slot`].
    pub fn validate_slot(&self, query: &SlotQuery) -> Result<TimeRange> {
        let today = self.today();
        self.store
            .read(|ledger| slot::validate_slot(ledger, &self.settings, today, query))?
    }

    /// Create a single booking. Internal meetings start approved, external
    /// meetings start pending.
    ///
    /// # Errors
    /// `Validation` or `Conflict` from the slot rules; `Store` on store failure.
    pub fn create_booking(&self, actor: &Actor, request: &BookingRequest) -> Result<Booking> {
        let parsed = request.parse()?;
        let booking = self.insert_occurrence(actor, &parsed, None)?;
        self.emit(creation_events(&booking));
        Ok(booking)
    }

    /// Create a booking that may repeat daily or weekly until a given date.
    ///
    /// The base date must be bookable or nothing is created. Later occurrences
    /// that fail validation are skipped and reported in `skipped_dates`. Each
    /// occurrence is its own transaction.
    ///
    /// # Errors
    /// The base occurrence's validation error, or a store failure.
    pub fn create_recurring_series(
        &self,
        actor: &Actor,
        request: &SeriesRequest,
    ) -> Result<SeriesOutcome> {
        let parsed = request.booking.parse()?;
        let expansion = expand_series(
            request.booking.date,
            request.recurrence,
            request.until,
            self.settings.max_series_occurrences,
        )?;
        let dates = expansion.dates;
        if expansion.truncated {
            tracing::warn!(
                cap = self.settings.max_series_occurrences,
                until = ?request.until,
                "series truncated at occurrence cap"
            );
        }
        let series_id = (request.recurrence != Recurrence::None && request.until.is_some())
            .then(SeriesId::new);

        let mut created = Vec::with_capacity(dates.len());
        let mut skipped_dates = Vec::new();
        for (index, date) in dates.iter().enumerate() {
            match self.insert_occurrence(actor, &parsed.on(*date), series_id) {
                Ok(booking) => created.push(booking),
                Err(err) if index == 0 => return Err(err),
                Err(err @ BookingError::Store(_)) => return Err(err),
                Err(err) => {
                    tracing::debug!(%date, reason = %err, "skipping occurrence");
                    skipped_dates.push(*date);
                }
            }
        }

        tracing::info!(
            series = ?series_id,
            requested = dates.len(),
            created = created.len(),
            "series created"
        );
        self.emit(created.iter().flat_map(creation_events));

        Ok(SeriesOutcome {
            series_id,
            created,
            requested_count: dates.len(),
            skipped_dates,
            truncated: expansion.truncated,
        })
    }

    /// Validate-then-insert as one atomic unit.
    fn insert_occurrence(
        &self,
        actor: &Actor,
        parsed: &ParsedRequest,
        series_id: Option<SeriesId>,
    ) -> Result<Booking> {
        let now = self.now();
        let today = self.today();
        let booking = self.store.transact(|ledger| {
            check_slot(
                ledger,
                &self.settings,
                today,
                &Slot {
                    room_id: parsed.request.room_id,
                    date: parsed.date,
                    range: TimeRange::new(parsed.start, parsed.end),
                    headcount: parsed.request.headcount,
                    exclude: None,
                },
            )?;
            let mut token = generate_token();
            while ledger.booking_by_token(&token).is_some() {
                token = generate_token();
            }
            let booking = Booking::new(actor.user_id.clone(), parsed, series_id, token, now);
            ledger.insert_booking(booking.clone());
            Ok(booking)
        })?;
        tracing::info!(
            booking = %booking.id,
            room = %booking.room_id,
            date = %booking.date,
            status = %booking.status(),
            "booking created"
        );
        Ok(booking)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// One booking, visible to its owner and to admins.
    ///
    /// # Errors
    /// `NotFound` for an unknown id, `Unauthorized` for someone else's booking.
    pub fn booking(&self, actor: &Actor, id: &BookingId) -> Result<Booking> {
        let booking = self
            .store
            .read(|ledger| ledger.booking(id).cloned())?
            .ok_or_else(|| BookingError::not_found("booking", id))?;
        actor.require_manage(&booking.user_id, "booking")?;
        Ok(booking)
    }

    /// Bookings matching `filter`, newest date and start first. Non-admins
    /// only see their own.
    pub fn bookings(&self, actor: &Actor, filter: &BookingFilter) -> Result<Vec<Booking>> {
        let mut found: Vec<Booking> = self.store.read(|ledger| {
            ledger
                .bookings()
                .filter(|b| actor.can_manage(&b.user_id) && filter.matches(b))
                .cloned()
                .collect()
        })?;
        found.sort_by(|a, b| (b.date, b.start).cmp(&(a.date, a.start)));
        Ok(found)
    }

    /// Every pending or approved booking between `from` and `to` inclusive,
    /// in chronological order. Visible to everyone so occupied slots show.
    pub fn calendar(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Booking>> {
        let mut found: Vec<Booking> = self.store.read(|ledger| {
            ledger
                .bookings()
                .filter(|b| !b.status().is_terminal() && b.date >= from && b.date <= to)
                .cloned()
                .collect()
        })?;
        found.sort_by_key(|b| (b.date, b.start, b.end));
        Ok(found)
    }

    pub fn pending_count(&self) -> Result<usize> {
        self.store.read(|ledger| {
            ledger
                .bookings()
                .filter(|b| b.status() == BookingStatus::Pending)
                .count()
        })
    }

    /// Hourly grid and free gaps of a room on a date.
    ///
    /// # Errors
    /// `NotFound` for an unknown room.
    pub fn room_availability(&self, room_id: RoomId, date: NaiveDate) -> Result<RoomAvailability> {
        self.store.read(|ledger| {
            ledger
                .room(&room_id)
                .ok_or_else(|| BookingError::not_found("room", room_id))?;
            Ok(availability::room_availability(
                room_id,
                date,
                ledger.bookings_on(room_id, date),
                &self.settings,
            ))
        })?
    }

    /// Earliest gap inside office hours long enough for `minutes`, if any.
    pub fn first_free_slot(
        &self,
        room_id: RoomId,
        date: NaiveDate,
        minutes: i64,
    ) -> Result<Option<FreeSlot>> {
        self.store.read(|ledger| {
            ledger
                .room(&room_id)
                .ok_or_else(|| BookingError::not_found("room", room_id))?;
            let busy: Vec<TimeRange> = ledger
                .bookings_with_status(room_id, date, BookingStatus::Approved)
                .map(Booking::range)
                .collect();
            let office = TimeRange::new(self.settings.office_open, self.settings.office_close);
            Ok(freebusy::find_first_free_slot(&busy, office, minutes))
        })?
    }

    // ─────────────────────────────────────────────────────────────────────
    // Rooms
    // ─────────────────────────────────────────────────────────────────────

    pub fn rooms(&self) -> Result<Vec<Room>> {
        let mut rooms: Vec<Room> = self.store.read(|ledger| ledger.rooms().cloned().collect())?;
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rooms)
    }

    pub fn room(&self, id: &RoomId) -> Result<Room> {
        self.store
            .read(|ledger| ledger.room(id).cloned())?
            .ok_or_else(|| BookingError::not_found("room", id))
    }

    /// # Errors
    /// `Unauthorized` for non-admins, `Validation` for a bad spec.
    pub fn add_room(&self, actor: &Actor, spec: &RoomSpec) -> Result<Room> {
        actor.require_admin("add rooms")?;
        let room = Room {
            id: RoomId::new(),
            name: spec.name.trim().to_string(),
            capacity: spec.capacity,
            max_duration_minutes: spec.max_duration_minutes,
            blocked: false,
            floor: spec.floor.clone(),
            amenities: spec.amenities.clone(),
        };
        self.check_room(&room)?;
        self.store.transact(|ledger| {
            ledger.insert_room(room.clone());
            Ok(())
        })?;
        tracing::info!(room = %room.id, name = %room.name, "room added");
        Ok(room)
    }

    /// Apply a partial update. Existing bookings are not re-validated.
    pub fn update_room(&self, actor: &Actor, id: &RoomId, patch: &RoomPatch) -> Result<Room> {
        actor.require_admin("update rooms")?;
        self.store.transact(|ledger| {
            let room = ledger.room_mut(id)?;
            if let Some(name) = &patch.name {
                room.name = name.trim().to_string();
            }
            if let Some(capacity) = patch.capacity {
                room.capacity = capacity;
            }
            if let Some(minutes) = patch.max_duration_minutes {
                room.max_duration_minutes = minutes;
            }
            if let Some(floor) = &patch.floor {
                room.floor = floor.clone();
            }
            if let Some(amenities) = &patch.amenities {
                room.amenities = amenities.clone();
            }
            if let Some(blocked) = patch.blocked {
                room.blocked = blocked;
            }
            let updated = room.clone();
            self.check_room(&updated)?;
            Ok(updated)
        })
    }

    /// A blocked room accepts no new bookings; existing ones are untouched.
    pub fn set_room_blocked(&self, actor: &Actor, id: &RoomId, blocked: bool) -> Result<Room> {
        let room = self.update_room(
            actor,
            id,
            &RoomPatch {
                blocked: Some(blocked),
                ..RoomPatch::default()
            },
        )?;
        tracing::info!(room = %room.id, blocked, "room block changed");
        Ok(room)
    }

    /// Delete a room that nothing references.
    ///
    /// # Errors
    /// `State` (`room_in_use`) while any booking or waitlist entry points at it.
    pub fn delete_room(&self, actor: &Actor, id: &RoomId) -> Result<Room> {
        actor.require_admin("delete rooms")?;
        self.store.transact(|ledger| {
            if ledger.room(id).is_none() {
                return Err(BookingError::not_found("room", id));
            }
            if ledger.references_room(id) {
                return Err(BookingError::state(
                    StateViolation::RoomInUse,
                    "Room has bookings or waitlist entries; block it instead.",
                ));
            }
            ledger
                .remove_room(id)
                .ok_or_else(|| BookingError::not_found("room", id))
        })
    }

    fn check_room(&self, room: &Room) -> Result<()> {
        if room.name.is_empty() {
            return Err(BookingError::Validation("Room name required.".to_string()));
        }
        if room.capacity == 0 {
            return Err(BookingError::Validation(
                "Capacity must be positive.".to_string(),
            ));
        }
        if room.max_duration_minutes < self.settings.min_slot_minutes {
            return Err(BookingError::Validation(format!(
                "Maximum duration must be at least {} minutes.",
                self.settings.min_slot_minutes
            )));
        }
        Ok(())
    }
}

/// Admins hear about every new booking; auto-approved ones also go to the
/// owner and to calendar sync.
fn creation_events(booking: &Booking) -> Vec<Event> {
    let mut events = vec![Event::BookingCreated {
        booking: booking.clone(),
    }];
    if booking.status() == BookingStatus::Approved {
        events.push(Event::BookingApproved {
            booking: booking.clone(),
        });
    }
    events
}
