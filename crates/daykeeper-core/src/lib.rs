//! # Daykeeper Core Library
//!
//! Core engine of the daykeeper accountability bot. It is CLI-first:
//! every operation is reachable from the standalone binary, with the
//! chat layer being a thin delivery surface over the same library.
//!
//! ## Architecture
//!
//! - **Scheduler Loop**: a per-minute tick that evaluates fixed-time,
//!   meal, and per-event triggers for every user in their own timezone
//! - **Event Index**: a numbered, per-day snapshot of the user's
//!   calendar, rebuilt atomically from the configured feed sources
//! - **Check-in Ledger**: the append-only prompt/acknowledgement record
//!   with fire-once semantics
//! - **Day Status / Streaks**: derived honored-day verdicts and runs
//! - **Storage**: SQLite persistence and TOML-based configuration
//! - **Integrations**: Telegram delivery, Todoist tasks, calendar feeds
//!
//! ## Key Components
//!
//! - [`Scheduler`]: the tick loop driver
//! - [`Database`]: users, event index, ledger, notes, people
//! - [`Config`]: application configuration management
//! - [`CalendarSource`] / [`MessageTransport`] / [`TaskService`]:
//!   traits at the external seams

pub mod clock;
pub mod error;
pub mod format;
pub mod index;
pub mod intake;
pub mod integrations;
pub mod ledger;
pub mod scheduler;
pub mod status;
pub mod storage;
pub mod streak;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, SourceError, TaskServiceError, TransportError};
pub use index::{rebuild_index, EventIndexEntry, RebuildOutcome, SourceWarning};
pub use intake::{get_day_status, get_streak, get_today_events, on_photo, on_text, IntakeOutcome};
pub use integrations::{CalendarSource, MessageTransport, Occurrence, TaskItem, TaskService};
pub use ledger::{CheckinKind, CheckinRecord};
pub use scheduler::Scheduler;
pub use status::{compute_day_status, DayStatus};
pub use storage::{Config, Database, PersonRecord, UserRecord};
pub use streak::{compute_streak, Streak};
