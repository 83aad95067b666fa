//! Reminder scheduling.
//!
//! - `recurrence`: next-occurrence rules for repeating reminders.
//! - `due`: which reminders should fire at a given minute.
//! - `runner`: the background [`Poller`] that fires them.

pub mod due;
pub mod recurrence;
pub mod runner;

pub use due::{DEFAULT_HORIZON_SECS, default_horizon, effective_horizon, is_due, select_due};
pub use recurrence::{next_occurrence, next_occurrence_after};
pub use runner::{Clock, DEFAULT_POLL_INTERVAL_SECS, Poller, PollerState, TickReport};
