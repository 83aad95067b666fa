//! Due-set selection.
//!
//! A reminder is due at `now` when it is enabled, its `scheduled_at` is not
//! after `now`, and it has not fired within the debounce horizon. The
//! horizon covers the window where a reminder has fired but its schedule
//! has not yet moved past `now` (clock or poll slack), so one occurrence is
//! never delivered twice.

use chrono::{Duration, NaiveDateTime};

use crate::store::Reminder;
use crate::time::truncate_to_minute;

/// Default debounce horizon in seconds.
pub const DEFAULT_HORIZON_SECS: i64 = 60;

/// Default debounce horizon.
#[must_use]
pub fn default_horizon() -> Duration {
    Duration::seconds(DEFAULT_HORIZON_SECS)
}

/// The horizon actually applied: `configured`, widened to at least one poll
/// interval so a reminder fired by one poll is never selected by the next.
#[must_use]
pub fn effective_horizon(configured: Duration, poll_interval: std::time::Duration) -> Duration {
    match Duration::from_std(poll_interval) {
        Ok(poll) => configured.max(poll),
        Err(_) => configured,
    }
}

/// Whether `reminder` is due at `now` with the given debounce horizon.
///
/// `now` is expected at minute resolution; see [`select_due`].
#[must_use]
pub fn is_due(reminder: &Reminder, now: NaiveDateTime, horizon: Duration) -> bool {
    if !reminder.enabled || reminder.scheduled_at > now {
        return false;
    }
    match reminder.last_fired_at {
        None => true,
        // A horizon reaching before the calendar's start covers every firing.
        Some(fired) => now
            .checked_sub_signed(horizon)
            .is_some_and(|cutoff| fired < cutoff),
    }
}

/// Keep the reminders that are due at `now`. Order is preserved but carries
/// no meaning.
pub fn select_due<I>(reminders: I, now: NaiveDateTime, horizon: Duration) -> Vec<Reminder>
where
    I: IntoIterator<Item = Reminder>,
{
    let now = truncate_to_minute(now);
    reminders
        .into_iter()
        .filter(|r| is_due(r, now, horizon))
        .collect()
}
