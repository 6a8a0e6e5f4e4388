//! Booking record store.
//!
//! The [`Ledger`] holds the rooms, bookings and waitlist tables. A [`Store`]
//! owns a ledger and exposes it only through [`Store::transact`], which runs a
//! closure as one atomic unit: the closure sees a consistent ledger, nobody else
//! can interleave, and its writes are committed only when it returns `Ok`.
//! Validate-then-insert and approve-then-cascade are each a single transaction,
//! which closes the check-then-act race between concurrent requests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{BookingError, Result};
use crate::model::{Booking, BookingId, BookingStatus, Room, RoomId, WaitlistEntry, WaitlistId};

/// A store with an atomic multi-row transaction primitive.
pub trait Store: Send + Sync {
    /// Run `f` as one atomic unit. Writes are discarded when `f` fails.
    fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Ledger) -> Result<T>;

    /// Run a read-only closure against a consistent view.
    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Ledger) -> T;
}

/// The tables of the booking core.
///
/// Public accessors are read-only; mutation is reserved to the engine so that
/// status changes and latches always go through their transition methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Snapshot", into = "Snapshot")]
pub struct Ledger {
    rooms: BTreeMap<RoomId, Room>,
    bookings: BTreeMap<BookingId, Booking>,
    waitlist: Vec<WaitlistEntry>,
    next_sequence: u64,
    /// Check-in token to booking. Tokens never change after creation.
    tokens: HashMap<String, BookingId>,
    /// Prior row values written during the open transaction, oldest first.
    journal: Vec<Undo>,
}

/// The prior value of one row touched by a transaction.
#[derive(Debug, Clone, PartialEq)]
enum Undo {
    Room(RoomId, Option<Room>),
    Booking(BookingId, Option<Booking>),
    WaitlistEntry(usize, WaitlistEntry),
    WaitlistPushed,
    WaitlistRemoved(usize, WaitlistEntry),
    Sequence(u64),
}

impl Ledger {
    pub fn room(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn booking(&self, id: &BookingId) -> Option<&Booking> {
        self.bookings.get(id)
    }

    pub fn bookings(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.values()
    }

    pub fn booking_by_token(&self, token: &str) -> Option<&Booking> {
        self.tokens.get(token).and_then(|id| self.bookings.get(id))
    }

    /// Bookings of any status in `room` on `date`.
    pub fn bookings_on(&self, room: RoomId, date: NaiveDate) -> impl Iterator<Item = &Booking> {
        self.bookings
            .values()
            .filter(move |b| b.room_id == room && b.date == date)
    }

    /// Bookings in `room` on `date` holding `status`.
    pub fn bookings_with_status(
        &self,
        room: RoomId,
        date: NaiveDate,
        status: BookingStatus,
    ) -> impl Iterator<Item = &Booking> {
        self.bookings_on(room, date)
            .filter(move |b| b.status() == status)
    }

    /// Waitlist entries in arrival order.
    pub fn waitlist(&self) -> impl Iterator<Item = &WaitlistEntry> {
        self.waitlist.iter()
    }

    pub fn waitlist_entry(&self, id: &WaitlistId) -> Option<&WaitlistEntry> {
        self.waitlist.iter().find(|w| &w.id == id)
    }

    pub fn references_room(&self, room: &RoomId) -> bool {
        self.bookings.values().any(|b| &b.room_id == room)
            || self.waitlist.iter().any(|w| &w.room_id == room)
    }

    pub(crate) fn insert_room(&mut self, room: Room) {
        let prior = self.rooms.insert(room.id, room.clone());
        self.journal.push(Undo::Room(room.id, prior));
    }

    pub(crate) fn room_mut(&mut self, id: &RoomId) -> Result<&mut Room> {
        let room = self
            .rooms
            .get_mut(id)
            .ok_or_else(|| BookingError::not_found("room", id))?;
        self.journal.push(Undo::Room(*id, Some(room.clone())));
        Ok(room)
    }

    pub(crate) fn remove_room(&mut self, id: &RoomId) -> Option<Room> {
        let room = self.rooms.remove(id)?;
        self.journal.push(Undo::Room(*id, Some(room.clone())));
        Some(room)
    }

    pub(crate) fn insert_booking(&mut self, booking: Booking) {
        self.tokens
            .insert(booking.checkin_token().to_string(), booking.id);
        let id = booking.id;
        let prior = self.bookings.insert(id, booking);
        self.journal.push(Undo::Booking(id, prior));
    }

    pub(crate) fn booking_mut(&mut self, id: &BookingId) -> Result<&mut Booking> {
        let booking = self
            .bookings
            .get_mut(id)
            .ok_or_else(|| BookingError::not_found("booking", id))?;
        self.journal.push(Undo::Booking(*id, Some(booking.clone())));
        Ok(booking)
    }

    /// Latch the waitlist entry at `index` as notified. Returns the entry if
    /// this call set the latch.
    pub(crate) fn latch_waitlist_notified(&mut self, index: usize) -> Option<WaitlistEntry> {
        let entry = self.waitlist.get_mut(index)?;
        let prior = entry.clone();
        if !entry.latch_notified() {
            return None;
        }
        let latched = entry.clone();
        self.journal.push(Undo::WaitlistEntry(index, prior));
        Some(latched)
    }

    /// Next arrival sequence number for a waitlist entry.
    pub(crate) fn take_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.journal.push(Undo::Sequence(seq));
        self.next_sequence += 1;
        seq
    }

    pub(crate) fn insert_waitlist(&mut self, entry: WaitlistEntry) {
        self.waitlist.push(entry);
        self.journal.push(Undo::WaitlistPushed);
    }

    pub(crate) fn remove_waitlist(&mut self, id: &WaitlistId) -> Option<WaitlistEntry> {
        let pos = self.waitlist.iter().position(|w| &w.id == id)?;
        let entry = self.waitlist.remove(pos);
        self.journal
            .push(Undo::WaitlistRemoved(pos, entry.clone()));
        Some(entry)
    }

    /// Forget the prior values of a successful transaction.
    fn commit(&mut self) {
        self.journal.clear();
    }

    /// Restore every row touched since the last commit, newest write first.
    fn rollback(&mut self) {
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::Room(id, Some(room)) => {
                    self.rooms.insert(id, room);
                }
                Undo::Room(id, None) => {
                    self.rooms.remove(&id);
                }
                Undo::Booking(id, prior) => {
                    if let Some(current) = self.bookings.remove(&id) {
                        if self.tokens.get(current.checkin_token()) == Some(&id) {
                            self.tokens.remove(current.checkin_token());
                        }
                    }
                    if let Some(booking) = prior {
                        self.tokens
                            .insert(booking.checkin_token().to_string(), id);
                        self.bookings.insert(id, booking);
                    }
                }
                Undo::WaitlistEntry(index, entry) => {
                    if let Some(slot) = self.waitlist.get_mut(index) {
                        *slot = entry;
                    }
                }
                Undo::WaitlistPushed => {
                    self.waitlist.pop();
                }
                Undo::WaitlistRemoved(index, entry) => {
                    self.waitlist.insert(index, entry);
                }
                Undo::Sequence(seq) => self.next_sequence = seq,
            }
        }
    }
}

/// Serialized form of a ledger: plain ordered lists.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    rooms: Vec<Room>,
    #[serde(default)]
    bookings: Vec<Booking>,
    #[serde(default)]
    waitlist: Vec<WaitlistEntry>,
}

impl From<Snapshot> for Ledger {
    fn from(snapshot: Snapshot) -> Self {
        let mut waitlist = snapshot.waitlist;
        waitlist.sort_by_key(WaitlistEntry::sequence);
        let next_sequence = waitlist.last().map_or(0, |w| w.sequence() + 1);
        let tokens = snapshot
            .bookings
            .iter()
            .map(|b| (b.checkin_token().to_string(), b.id))
            .collect();
        Ledger {
            rooms: snapshot.rooms.into_iter().map(|r| (r.id, r)).collect(),
            bookings: snapshot.bookings.into_iter().map(|b| (b.id, b)).collect(),
            waitlist,
            next_sequence,
            tokens,
            journal: Vec::new(),
        }
    }
}

impl From<Ledger> for Snapshot {
    fn from(ledger: Ledger) -> Self {
        Snapshot {
            rooms: ledger.rooms.into_values().collect(),
            bookings: ledger.bookings.into_values().collect(),
            waitlist: ledger.waitlist,
        }
    }
}

/// In-process store guarded by a mutex.
///
/// Transactions write in place and journal the prior value of each row they
/// touch. A failed transaction replays the journal backwards, so it leaves no
/// partial writes behind and a write costs only the rows it changes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: Mutex<Ledger>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ledger(ledger: Ledger) -> Self {
        MemoryStore {
            ledger: Mutex::new(ledger),
        }
    }

    /// A copy of the current tables, e.g. for persisting a snapshot.
    pub fn snapshot(&self) -> Result<Ledger> {
        self.read(Ledger::clone)
    }
}

impl Store for MemoryStore {
    fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Ledger) -> Result<T>,
    {
        let mut guard = self
            .ledger
            .lock()
            .map_err(|_| BookingError::Store("ledger lock poisoned".to_string()))?;
        guard.commit();
        match f(&mut *guard) {
            Ok(value) => {
                guard.commit();
                Ok(value)
            }
            Err(err) => {
                guard.rollback();
                Err(err)
            }
        }
    }

    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Ledger) -> T,
    {
        let guard = self
            .ledger
            .lock()
            .map_err(|_| BookingError::Store("ledger lock poisoned".to_string()))?;
        Ok(f(&guard))
    }
}
