//! Shared fixture: one engine on a frozen clock with a recording sink and a
//! single room (capacity 10, max 4 hours).

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use room_engine::{
    Actor, BookingRequest, Engine, Event, FixedClock, MeetingKind, MemoryStore, RecordingSink,
    Room, RoomId, RoomSpec, Settings,
};

pub struct Fixture {
    pub engine: Arc<Engine<MemoryStore>>,
    pub clock: Arc<FixedClock>,
    pub sink: Arc<RecordingSink>,
    pub admin: Actor,
    pub room: Room,
}

impl Fixture {
    /// Drain recorded events and return their kinds.
    pub fn event_kinds(&self) -> Vec<&'static str> {
        self.sink.take().iter().map(Event::kind).collect()
    }
}

/// Clock at 2024-01-01 08:00 UTC, default settings.
pub fn fixture() -> Fixture {
    fixture_with(Settings::default())
}

pub fn fixture_with(settings: Settings) -> Fixture {
    let clock = Arc::new(FixedClock::new(at(2024, 1, 1, 8, 0)));
    let sink = Arc::new(RecordingSink::new());
    let engine = Engine::new(MemoryStore::new(), settings)
        .unwrap()
        .with_clock(clock.clone())
        .with_sink(sink.clone());
    let admin = Actor::admin("admin");
    let room = engine
        .add_room(&admin, &RoomSpec::new("Meeting Room 1", 10))
        .unwrap();
    Fixture {
        engine: Arc::new(engine),
        clock,
        sink,
        admin,
        room,
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn at(year: i32, month: u32, day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, 0).unwrap()
}

pub fn internal(room: RoomId, day: NaiveDate, start: &str, end: &str) -> BookingRequest {
    BookingRequest::new(room, day, start, end, MeetingKind::Internal, "Standup")
}

pub fn external(room: RoomId, day: NaiveDate, start: &str, end: &str) -> BookingRequest {
    BookingRequest::new(room, day, start, end, MeetingKind::External, "Client visit")
}
