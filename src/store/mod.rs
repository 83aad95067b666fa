//! Persistent reminder store.
//!
//! Sub-modules:
//! - `types`: reminder, repeat rule, and interval-session records.
//! - `schema`: SQLite DDL definitions.
//! - `sqlite`: the SQLite-backed [`ReminderStore`].

pub(crate) mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::{DB_FILENAME, ReminderStore, StoreError};
pub use types::{
    IntervalSession, NewReminder, NewSession, Reminder, Repeat, TimerKind, UnknownRepeat,
};
