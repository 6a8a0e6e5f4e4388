//! `roomctl`: drive the meeting-room booking core from the command line.
//!
//! Every invocation loads a JSON ledger snapshot, runs one operation against
//! an in-memory engine, writes the snapshot back and prints the result
//! together with the events the operation emitted.
//!
//! ## Usage
//!
//! ```sh
//! # Add a room (admin only)
//! roomctl --admin room add "Meeting Room 1" --capacity 10
//!
//! # Book an internal meeting; it is approved immediately
//! roomctl --user alice book --room <ROOM> --date 2024-01-02 \
//!     --start 10:00 --end 11:00 --purpose Standup
//!
//! # Book a weekly external meeting, pending approval
//! roomctl --user bob book --room <ROOM> --date 2024-01-02 --start 14:00 \
//!     --end 15:00 --kind external --purpose "Client visit" \
//!     --repeat weekly --until 2024-02-27
//!
//! # Approve it; overlapping pending requests are rejected
//! roomctl --admin approve <BOOKING>
//!
//! # Check in with the token from the booking_created event
//! roomctl check-in <TOKEN>
//! ```
//!
//! Failures print `error[<code>]: <message>` on stderr and exit non-zero.
//! Set `RUST_LOG=room_engine=info` to see the engine's log on stderr.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use room_engine::{
    Actor, BookingError, BookingFilter, BookingId, BookingRequest, BookingStatus, Clock, Engine,
    Event, FixedClock, Ledger, MeetingKind, MemoryStore, RecordingSink, Recurrence, RoomId,
    RoomSpec, SeriesRequest, Settings, SlotQuery, SystemClock, WaitlistId, WaitlistRequest,
};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "roomctl", version, about = "Meeting-room booking ledger CLI")]
struct Cli {
    /// Ledger snapshot file (created when absent)
    #[arg(long, global = true, default_value = "roomctl.json")]
    state: PathBuf,

    /// JSON settings file; defaults apply when omitted
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Acting user id
    #[arg(long, global = true, default_value = "anonymous")]
    user: String,

    /// Act with administrator rights
    #[arg(long, global = true)]
    admin: bool,

    /// Pretend the current instant is this RFC 3339 timestamp
    #[arg(long, global = true)]
    now: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage rooms
    Room {
        #[command(subcommand)]
        action: RoomAction,
    },
    /// Check whether a slot could be booked, without booking it
    Validate {
        #[command(flatten)]
        slot: SlotArgs,
        #[arg(long)]
        headcount: Option<u32>,
    },
    /// Create a booking, optionally repeating
    Book(BookArgs),
    /// Approve a pending booking
    Approve { id: BookingId },
    /// Reject a pending booking
    Reject {
        id: BookingId,
        #[arg(long)]
        reason: String,
    },
    /// Cancel a booking, or every upcoming occurrence of its series
    Cancel {
        id: BookingId,
        #[arg(long)]
        series: bool,
    },
    /// Check in with a booking's check-in token
    CheckIn { token: String },
    /// Manage waitlist entries
    Waitlist {
        #[command(subcommand)]
        action: WaitlistAction,
    },
    /// Hourly availability grid of a room
    Availability {
        #[arg(long)]
        room: RoomId,
        #[arg(long)]
        date: NaiveDate,
        /// Only report the first free gap of at least this many minutes
        #[arg(long)]
        first_free: Option<i64>,
    },
    /// Reminders due now
    Reminders {
        /// Latch the reminder flag of every due booking
        #[arg(long)]
        mark: bool,
    },
    /// List bookings visible to the acting user
    List {
        #[arg(long)]
        room: Option<RoomId>,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Substring of the purpose or owner
        #[arg(long)]
        text: Option<String>,
    },
    /// Active bookings of all users between two dates
    Calendar {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
}

#[derive(Subcommand)]
enum RoomAction {
    Add {
        name: String,
        #[arg(long, default_value_t = 10)]
        capacity: u32,
        /// Longest allowed booking in minutes
        #[arg(long, default_value_t = 240)]
        max_duration: u32,
        #[arg(long, default_value = "")]
        floor: String,
        #[arg(long = "amenity")]
        amenities: Vec<String>,
    },
    List,
    Block { id: RoomId },
    Unblock { id: RoomId },
    Delete { id: RoomId },
}

#[derive(Subcommand)]
enum WaitlistAction {
    Add {
        #[command(flatten)]
        slot: SlotArgs,
        #[arg(long)]
        purpose: String,
    },
    List,
    Remove { id: WaitlistId },
}

#[derive(clap::Args)]
struct SlotArgs {
    #[arg(long)]
    room: RoomId,
    #[arg(long)]
    date: NaiveDate,
    /// HH:MM
    #[arg(long)]
    start: String,
    /// HH:MM
    #[arg(long)]
    end: String,
}

#[derive(clap::Args)]
struct BookArgs {
    #[command(flatten)]
    slot: SlotArgs,
    #[arg(long, value_enum, default_value_t = KindArg::Internal)]
    kind: KindArg,
    #[arg(long)]
    purpose: String,
    #[arg(long)]
    headcount: Option<u32>,
    /// Request catering with this preference
    #[arg(long)]
    food: Option<String>,
    #[arg(long, default_value = "")]
    remarks: String,
    #[arg(long = "guest")]
    guests: Vec<String>,
    #[arg(long, value_enum)]
    repeat: Option<RepeatArg>,
    /// Last date of the series, inclusive
    #[arg(long, requires = "repeat")]
    until: Option<NaiveDate>,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Internal,
    External,
}

impl From<KindArg> for MeetingKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Internal => MeetingKind::Internal,
            KindArg::External => MeetingKind::External,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RepeatArg {
    Daily,
    Weekly,
}

impl From<RepeatArg> for Recurrence {
    fn from(repeat: RepeatArg) -> Self {
        match repeat {
            RepeatArg::Daily => Recurrence::Daily,
            RepeatArg::Weekly => Recurrence::Weekly,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl From<StatusArg> for BookingStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Pending => BookingStatus::Pending,
            StatusArg::Approved => BookingStatus::Approved,
            StatusArg::Rejected => BookingStatus::Rejected,
            StatusArg::Cancelled => BookingStatus::Cancelled,
        }
    }
}

/// What one invocation prints on stdout.
#[derive(Serialize)]
struct Output {
    result: Value,
    events: Vec<Event>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let code = err
                .downcast_ref::<BookingError>()
                .map_or("error", BookingError::code);
            eprintln!("error[{code}]: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<String> {
    let settings = load_settings(cli.settings.as_deref())?;
    let ledger = load_ledger(&cli.state)?;

    let clock: Arc<dyn Clock> = match cli.now {
        Some(now) => Arc::new(FixedClock::new(now)),
        None => Arc::new(SystemClock),
    };
    let sink = Arc::new(RecordingSink::new());
    let engine = Engine::new(MemoryStore::from_ledger(ledger), settings)
        .context("Invalid settings")?
        .with_clock(clock)
        .with_sink(sink.clone());

    let actor = if cli.admin {
        Actor::admin(cli.user)
    } else {
        Actor::user(cli.user)
    };

    let result = execute(&engine, &actor, cli.command)?;
    save_ledger(&cli.state, &engine.store().snapshot()?)?;

    let output = Output {
        result,
        events: sink.take(),
    };
    serde_json::to_string_pretty(&output).context("Failed to render output")
}

fn execute(engine: &Engine<MemoryStore>, actor: &Actor, command: Commands) -> Result<Value> {
    match command {
        Commands::Room { action } => match action {
            RoomAction::Add {
                name,
                capacity,
                max_duration,
                floor,
                amenities,
            } => {
                let spec = RoomSpec {
                    floor,
                    amenities,
                    ..RoomSpec::new(name, capacity).max_duration(max_duration)
                };
                to_json(engine.add_room(actor, &spec).context("Failed to add room")?)
            }
            RoomAction::List => to_json(engine.rooms()?),
            RoomAction::Block { id } => to_json(
                engine
                    .set_room_blocked(actor, &id, true)
                    .with_context(|| format!("Failed to block room {id}"))?,
            ),
            RoomAction::Unblock { id } => to_json(
                engine
                    .set_room_blocked(actor, &id, false)
                    .with_context(|| format!("Failed to unblock room {id}"))?,
            ),
            RoomAction::Delete { id } => to_json(
                engine
                    .delete_room(actor, &id)
                    .with_context(|| format!("Failed to delete room {id}"))?,
            ),
        },
        Commands::Validate { slot, headcount } => {
            let range = engine.validate_slot(&SlotQuery {
                room_id: slot.room,
                date: slot.date,
                start: slot.start,
                end: slot.end,
                headcount,
                exclude: None,
            })?;
            to_json(range)
        }
        Commands::Book(args) => book(engine, actor, args),
        Commands::Approve { id } => to_json(
            engine
                .approve(actor, &id)
                .with_context(|| format!("Failed to approve booking {id}"))?,
        ),
        Commands::Reject { id, reason } => to_json(
            engine
                .reject(actor, &id, &reason)
                .with_context(|| format!("Failed to reject booking {id}"))?,
        ),
        Commands::Cancel { id, series: false } => to_json(
            engine
                .cancel(actor, &id)
                .with_context(|| format!("Failed to cancel booking {id}"))?,
        ),
        Commands::Cancel { id, series: true } => to_json(
            engine
                .cancel_series(actor, &id)
                .with_context(|| format!("Failed to cancel the series of booking {id}"))?,
        ),
        Commands::CheckIn { token } => to_json(engine.check_in(&token).context("Check-in failed")?),
        Commands::Waitlist { action } => match action {
            WaitlistAction::Add { slot, purpose } => {
                let request = WaitlistRequest {
                    room_id: slot.room,
                    date: slot.date,
                    start: slot.start,
                    end: slot.end,
                    purpose,
                };
                to_json(
                    engine
                        .register_waitlist_entry(actor, &request)
                        .context("Failed to join the waitlist")?,
                )
            }
            WaitlistAction::List => to_json(engine.waitlist(actor)?),
            WaitlistAction::Remove { id } => to_json(
                engine
                    .remove_waitlist_entry(actor, &id)
                    .with_context(|| format!("Failed to remove waitlist entry {id}"))?,
            ),
        },
        Commands::Availability {
            room,
            date,
            first_free: Some(minutes),
        } => to_json(engine.first_free_slot(room, date, minutes)?),
        Commands::Availability {
            room,
            date,
            first_free: None,
        } => to_json(engine.room_availability(room, date)?),
        Commands::Reminders { mark } => {
            let due = engine.due_reminders()?;
            if mark {
                for booking in &due {
                    engine.mark_reminder_sent(&booking.id)?;
                }
            }
            to_json(due)
        }
        Commands::List {
            room,
            status,
            kind,
            date,
            text,
        } => {
            let filter = BookingFilter {
                room_id: room,
                status: status.map(Into::into),
                meeting_kind: kind.map(Into::into),
                date,
                text,
            };
            to_json(engine.bookings(actor, &filter)?)
        }
        Commands::Calendar { from, to } => to_json(engine.calendar(from, to)?),
    }
}

fn book(engine: &Engine<MemoryStore>, actor: &Actor, args: BookArgs) -> Result<Value> {
    let mut request = BookingRequest::new(
        args.slot.room,
        args.slot.date,
        &args.slot.start,
        &args.slot.end,
        args.kind.into(),
        &args.purpose,
    )
    .guests(args.guests);
    request.headcount = args.headcount;
    request.remarks = args.remarks;
    if let Some(preference) = args.food.as_deref() {
        request = request.food(preference);
    }

    match args.repeat {
        None => to_json(
            engine
                .create_booking(actor, &request)
                .context("Failed to create booking")?,
        ),
        Some(repeat) => {
            let series = SeriesRequest {
                booking: request,
                recurrence: repeat.into(),
                until: args.until,
            };
            to_json(
                engine
                    .create_recurring_series(actor, &series)
                    .context("Failed to create recurring series")?,
            )
        }
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).context("Failed to serialize result")
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings: {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse settings: {}", path.display()))
        }
        None => Ok(Settings::default()),
    }
}

fn load_ledger(path: &Path) -> Result<Ledger> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "starting with an empty ledger");
        return Ok(Ledger::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read state: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse state: {}", path.display()))
}

/// Write through a sibling temp file so a crash never leaves half a snapshot.
fn save_ledger(path: &Path, ledger: &Ledger) -> Result<()> {
    let json = serde_json::to_string_pretty(ledger).context("Failed to serialize state")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("Failed to write state: {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace state: {}", path.display()))?;
    Ok(())
}
