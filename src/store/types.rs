//! Reminder and interval-session records.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::AgendaError;
use crate::time::{parse_minute, truncate_to_minute};

/// Current database schema version. Version 1 databases are upgraded on
/// open.
pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 2;

// ---------------------------------------------------------------------------
// Repeat rule
// ---------------------------------------------------------------------------

/// How a reminder recurs after it fires.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Repeat {
    /// One-shot: disabled after its single firing.
    #[default]
    None,
    /// Same time every day.
    Daily,
    /// Same weekday and time every week.
    Weekly,
    /// Same time Monday through Friday.
    Weekdays,
}

impl Repeat {
    /// All rules, in the order they are offered to users.
    pub const ALL: [Repeat; 4] = [Repeat::None, Repeat::Daily, Repeat::Weekly, Repeat::Weekdays];

    /// The persisted string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Repeat::None => "none",
            Repeat::Daily => "daily",
            Repeat::Weekly => "weekly",
            Repeat::Weekdays => "weekdays",
        }
    }

    /// Whether the reminder fires more than once.
    #[must_use]
    pub fn is_repeating(self) -> bool {
        self != Repeat::None
    }
}

impl fmt::Display for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Error returned when a repeat rule string is not one of the known values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown repeat rule '{0}' (expected none, daily, weekly or weekdays)")]
pub struct UnknownRepeat(pub String);

impl FromStr for Repeat {
    type Err = UnknownRepeat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Repeat::None),
            "daily" => Ok(Repeat::Daily),
            "weekly" => Ok(Repeat::Weekly),
            "weekdays" => Ok(Repeat::Weekdays),
            other => Err(UnknownRepeat(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Reminder
// ---------------------------------------------------------------------------

/// A persisted reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Row id; `None` until the store assigns one.
    pub id: Option<i64>,
    /// Short title, also used as the notification message.
    pub title: String,
    /// Free-form notes.
    #[serde(default)]
    pub description: String,
    /// Next time this reminder fires (minute resolution).
    pub scheduled_at: NaiveDateTime,
    /// Recurrence rule.
    pub repeat: Repeat,
    /// Whether the reminder takes part in due-set selection.
    pub enabled: bool,
    /// When the reminder last fired, if ever.
    #[serde(default)]
    pub last_fired_at: Option<NaiveDateTime>,
}

impl Reminder {
    /// Whether the reminder has a store-assigned id.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// Input for creating a reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReminder {
    pub title: String,
    pub description: String,
    pub scheduled_at: NaiveDateTime,
    pub repeat: Repeat,
}

impl NewReminder {
    /// Create a reminder request with an empty description.
    pub fn new(title: impl Into<String>, scheduled_at: NaiveDateTime, repeat: Repeat) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            scheduled_at: truncate_to_minute(scheduled_at),
            repeat,
        }
    }

    /// Attach notes.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Build a request from raw form input: `YYYY-MM-DD HH:MM` and a repeat
    /// rule name.
    ///
    /// # Errors
    ///
    /// Returns [`AgendaError::Validation`] for an empty title, an unparseable
    /// date/time, or an unknown repeat rule.
    pub fn from_input(title: &str, when: &str, repeat: &str) -> crate::error::Result<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AgendaError::Validation("title must not be empty".to_owned()));
        }
        let scheduled_at = parse_minute(when)?;
        let repeat = repeat
            .parse::<Repeat>()
            .map_err(|e| AgendaError::Validation(e.to_string()))?;
        Ok(Self::new(title, scheduled_at, repeat))
    }
}

// ---------------------------------------------------------------------------
// Interval sessions
// ---------------------------------------------------------------------------

/// Which interval timer produced a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Work/break cycles (e.g. 25/5).
    Pomodoro,
    /// Short high-intensity work/rest rounds (e.g. 20s/10s x 8).
    Tabata,
}

impl TimerKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TimerKind::Pomodoro => "pomodoro",
            TimerKind::Tabata => "tabata",
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TimerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pomodoro" => Ok(TimerKind::Pomodoro),
            "tabata" => Ok(TimerKind::Tabata),
            other => Err(format!("unknown timer kind '{other}'")),
        }
    }
}

/// A completed (or abandoned) interval-timer session. Write-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalSession {
    pub id: i64,
    pub started_at: NaiveDateTime,
    pub kind: TimerKind,
    /// Rounds (Tabata) or work/break cycles (Pomodoro).
    pub rounds: u32,
    pub work_secs: u32,
    pub rest_secs: u32,
    pub completed: bool,
}

/// Input for logging a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub started_at: NaiveDateTime,
    pub kind: TimerKind,
    pub rounds: u32,
    pub work_secs: u32,
    pub rest_secs: u32,
    pub completed: bool,
}

impl NewSession {
    /// A completed session.
    pub fn completed(
        kind: TimerKind,
        started_at: NaiveDateTime,
        rounds: u32,
        work_secs: u32,
        rest_secs: u32,
    ) -> Self {
        Self {
            started_at: truncate_to_minute(started_at),
            kind,
            rounds,
            work_secs,
            rest_secs,
            completed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn repeat_parses_known_values_case_insensitively() {
        assert_eq!("none".parse::<Repeat>().unwrap(), Repeat::None);
        assert_eq!("Daily".parse::<Repeat>().unwrap(), Repeat::Daily);
        assert_eq!(" WEEKLY ".parse::<Repeat>().unwrap(), Repeat::Weekly);
        assert_eq!("weekdays".parse::<Repeat>().unwrap(), Repeat::Weekdays);
    }

    #[test]
    fn repeat_rejects_unknown_value() {
        let err = "monthly".parse::<Repeat>().unwrap_err();
        assert_eq!(err, UnknownRepeat("monthly".to_owned()));
        assert!(err.to_string().contains("monthly"));
    }

    #[test]
    fn repeat_str_forms_round_trip() {
        for rule in Repeat::ALL {
            assert_eq!(rule.as_str().parse::<Repeat>().unwrap(), rule);
        }
    }

    #[test]
    fn only_none_is_one_shot() {
        assert!(!Repeat::None.is_repeating());
        assert!(Repeat::Daily.is_repeating());
        assert!(Repeat::Weekly.is_repeating());
        assert!(Repeat::Weekdays.is_repeating());
    }

    #[test]
    fn new_reminder_truncates_to_minute() {
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(9, 0, 45)
            .unwrap();
        let req = NewReminder::new("Stand up", ts, Repeat::Daily).with_description("stretch");
        assert_eq!(req.scheduled_at.format("%H:%M:%S").to_string(), "09:00:00");
        assert_eq!(req.description, "stretch");
    }

    #[test]
    fn from_input_accepts_form_values() {
        let req = NewReminder::from_input(" Dentist ", "2024-01-05 09:30", "Weekly").unwrap();
        assert_eq!(req.title, "Dentist");
        assert_eq!(req.repeat, Repeat::Weekly);
        assert_eq!(crate::time::to_display(req.scheduled_at), "2024-01-05 09:30");
    }

    #[test]
    fn from_input_rejects_bad_values() {
        for (title, when, repeat) in [
            ("", "2024-01-05 09:30", "none"),
            ("x", "05/01/2024 9:30", "none"),
            ("x", "2024-01-05 09:30", "monthly"),
        ] {
            assert!(matches!(
                NewReminder::from_input(title, when, repeat),
                Err(AgendaError::Validation(_))
            ));
        }
    }

    #[test]
    fn timer_kind_parses() {
        assert_eq!("tabata".parse::<TimerKind>().unwrap(), TimerKind::Tabata);
        assert!("sprint".parse::<TimerKind>().is_err());
    }
}
