//! Agenda: recurring reminders and interval-timer history.
//!
//! # Architecture
//!
//! - **Store**: SQLite-backed [`ReminderStore`] holding reminders and
//!   completed interval sessions
//! - **Recurrence**: pure next-occurrence rules for `daily`, `weekly` and
//!   `weekdays` reminders
//! - **Due-set selection**: which enabled reminders should fire at a given
//!   minute, debounced against recent firings
//! - **Poller**: background tokio task that fires due reminders through a
//!   [`NotificationSink`] and writes the rolled-over state back
//! - **Export**: user-triggered calendar export (`.ics`)
//!
//! Timestamps are local wall-clock time at minute resolution.

pub mod app_dirs;
pub mod config;
pub mod error;
pub mod export;
pub mod notify;
pub mod scheduler;
pub mod store;
pub mod time;

pub use config::AgendaConfig;
pub use error::{AgendaError, Result};
pub use export::{ExportReport, ExportSink, IcsExporter, MultiExporter};
pub use notify::{CommandNotifier, FanoutNotifier, LogNotifier, NotificationSink, NotifyError};
pub use scheduler::{Poller, PollerState, TickReport, next_occurrence, next_occurrence_after};
pub use store::{
    IntervalSession, NewReminder, NewSession, Reminder, ReminderStore, Repeat, StoreError,
    TimerKind,
};
