//! Minute-resolution timestamp helpers.
//!
//! Every timestamp the engine compares or stores is a local, naive
//! [`NaiveDateTime`] with seconds and sub-seconds cleared. User input uses
//! `YYYY-MM-DD HH:MM`; the database uses the ISO-8601 form
//! `YYYY-MM-DDTHH:MM`.

use chrono::{Local, NaiveDateTime, Timelike};

use crate::error::{AgendaError, Result};

/// Format accepted from users (CLI, forms).
pub const INPUT_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Format written to the `reminders` and `interval_sessions` tables.
pub const STORAGE_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Older rows may carry seconds; they are accepted and truncated.
const STORAGE_FORMAT_SECS: &str = "%Y-%m-%dT%H:%M:%S";

/// Drop seconds and sub-second precision.
#[must_use]
pub fn truncate_to_minute(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Current local wall-clock time at minute resolution.
#[must_use]
pub fn now_minute() -> NaiveDateTime {
    truncate_to_minute(Local::now().naive_local())
}

/// Parse user input in `YYYY-MM-DD HH:MM` form.
///
/// The ISO form with a `T` separator is accepted as well.
pub fn parse_minute(input: &str) -> Result<NaiveDateTime> {
    let trimmed = input.trim();
    NaiveDateTime::parse_from_str(trimmed, INPUT_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, STORAGE_FORMAT))
        .map(truncate_to_minute)
        .map_err(|e| {
            AgendaError::Validation(format!(
                "invalid date/time '{trimmed}' (expected YYYY-MM-DD HH:MM): {e}"
            ))
        })
}

/// Render a timestamp for the database.
#[must_use]
pub fn to_storage(ts: NaiveDateTime) -> String {
    truncate_to_minute(ts).format(STORAGE_FORMAT).to_string()
}

/// Parse a timestamp read back from the database.
pub fn from_storage(raw: &str) -> std::result::Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, STORAGE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, STORAGE_FORMAT_SECS))
        .map(truncate_to_minute)
}

/// Render a timestamp for people.
#[must_use]
pub fn to_display(ts: NaiveDateTime) -> String {
    ts.format(INPUT_FORMAT).to_string()
}
