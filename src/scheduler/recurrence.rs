//! Next-occurrence computation for repeat rules.
//!
//! Pure functions; nothing here reads the clock or touches the store.

use chrono::{Datelike, Duration, NaiveDateTime, Weekday};

use crate::store::{Reminder, Repeat};

/// The occurrence following `reminder.scheduled_at`, or `None` for one-shots.
///
/// Time-of-day is preserved. `Weekdays` steps one day and then skips
/// Saturday and Sunday, so a Friday occurrence rolls to Monday.
#[must_use]
pub fn next_occurrence(reminder: &Reminder) -> Option<NaiveDateTime> {
    step(reminder.scheduled_at, reminder.repeat)
}

/// The first occurrence strictly after `now`.
///
/// Applies [`next_occurrence`] until the result passes `now`, so a reminder
/// that was overdue by several periods fires once and then lands in the
/// future instead of firing once per missed period.
#[must_use]
pub fn next_occurrence_after(reminder: &Reminder, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let mut next = step(reminder.scheduled_at, reminder.repeat)?;
    if next > now {
        return Some(next);
    }

    // Jump whole periods for long gaps, then finish with single steps.
    let period_days = match reminder.repeat {
        Repeat::Daily => 1,
        Repeat::Weekly => 7,
        Repeat::Weekdays | Repeat::None => 0,
    };
    if period_days > 0 {
        let behind_days = (now - next).num_days();
        let periods = behind_days / period_days;
        next += Duration::days(periods * period_days);
    }

    while next <= now {
        next = step(next, reminder.repeat)?;
    }
    Some(next)
}

fn step(from: NaiveDateTime, repeat: Repeat) -> Option<NaiveDateTime> {
    match repeat {
        Repeat::None => None,
        Repeat::Daily => Some(from + Duration::days(1)),
        Repeat::Weekly => Some(from + Duration::weeks(1)),
        Repeat::Weekdays => {
            let mut next = from + Duration::days(1);
            while is_weekend(next) {
                next += Duration::days(1);
            }
            Some(next)
        }
    }
}

fn is_weekend(ts: NaiveDateTime) -> bool {
    matches!(ts.weekday(), Weekday::Sat | Weekday::Sun)
}
