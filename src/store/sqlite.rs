//! SQLite-backed reminder store.
//!
//! One database file holds the `reminders` table consumed by the scheduler
//! and the append-only `interval_sessions` log written by the timers.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, warn};

use super::schema::{apply_schema, read_schema_version};
use super::types::{
    IntervalSession, NewReminder, NewSession, Reminder, Repeat, TimerKind,
};
use crate::scheduler::due::select_due;
use crate::time::{from_storage, to_storage, truncate_to_minute};

/// Default database filename within the data directory.
pub const DB_FILENAME: &str = "agenda.db";

const REMINDER_COLUMNS: &str =
    "id, title, description, scheduled_at, repeat, enabled, last_fired_at";

const SESSION_COLUMNS: &str = "id, started_at, kind, rounds, work_secs, rest_secs, completed";

/// SQLite-backed reminder store.
///
/// Thread-safe via an internal `Mutex<Connection>`. The poller and the
/// interactive side share one instance behind an `Arc`; every operation
/// touches at most one reminder row, so the mutex is all the coordination
/// the engine needs.
pub struct ReminderStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl ReminderStore {
    /// Open (or create) the database at `path`.
    ///
    /// Creates the parent directory and applies the schema if needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        debug!(path = %path.display(), "opened reminder store");
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Mutex::new(conn),
        })
    }

    /// Open (or create) `{dir}/agenda.db`.
    pub fn open_in_dir(dir: &Path) -> Result<Self, StoreError> {
        Self::open(&dir.join(DB_FILENAME))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            path: None,
            conn: Mutex::new(conn),
        })
    }

    /// Database file path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Idempotent schema application.
    pub fn ensure_layout(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        apply_schema(&conn)?;
        Ok(())
    }

    /// Read the current schema version from the database.
    pub fn schema_version(&self) -> Result<Option<u32>, StoreError> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    // -----------------------------------------------------------------------
    // Reminders
    // -----------------------------------------------------------------------

    /// Insert a new, enabled, never-fired reminder and return its id.
    pub fn add_reminder(&self, req: &NewReminder) -> Result<i64, StoreError> {
        let title = validated_title(&req.title)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO reminders \
             (title, description, scheduled_at, repeat, enabled, last_fired_at) \
             VALUES (?1, ?2, ?3, ?4, 1, NULL)",
            params![
                title,
                req.description,
                to_storage(req.scheduled_at),
                req.repeat.as_str(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, repeat = %req.repeat, "reminder added");
        Ok(id)
    }

    /// Fetch one reminder by id.
    pub fn get_reminder(&self, id: i64) -> Result<Option<Reminder>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1");
        let reminder = conn
            .query_row(&sql, params![id], row_to_reminder)
            .optional()?;
        Ok(reminder)
    }

    /// Overwrite every column of an existing reminder, keyed by its id.
    pub fn update_reminder(&self, reminder: &Reminder) -> Result<(), StoreError> {
        let id = reminder.id.ok_or(StoreError::MissingId)?;
        let title = validated_title(&reminder.title)?;
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE reminders SET title = ?1, description = ?2, scheduled_at = ?3, \
             repeat = ?4, enabled = ?5, last_fired_at = ?6 WHERE id = ?7",
            params![
                title,
                reminder.description,
                to_storage(reminder.scheduled_at),
                reminder.repeat.as_str(),
                reminder.enabled,
                reminder.last_fired_at.map(to_storage),
                id,
            ],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    /// Delete a reminder. Firing never deletes; only users do.
    pub fn delete_reminder(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM reminders WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!(id, "reminder deleted");
        Ok(())
    }

    /// Enable or disable a reminder without touching its schedule.
    pub fn set_enabled(&self, id: i64, enabled: bool) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE reminders SET enabled = ?1 WHERE id = ?2",
            params![enabled, id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    /// All reminders, soonest first.
    pub fn list_reminders(&self) -> Result<Vec<Reminder>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders ORDER BY datetime(scheduled_at) ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_reminder)?;

        let mut reminders = Vec::new();
        for r in rows {
            reminders.push(r?);
        }
        Ok(reminders)
    }

    /// Enabled reminders scheduled at or before `now` that have not fired
    /// within `horizon` of `now`. Read-only.
    pub fn due_reminders(
        &self,
        now: NaiveDateTime,
        horizon: Duration,
    ) -> Result<Vec<Reminder>, StoreError> {
        let now = truncate_to_minute(now);
        let candidates = {
            let conn = self.lock()?;
            let sql = format!(
                "SELECT {REMINDER_COLUMNS} FROM reminders \
                 WHERE enabled = 1 AND datetime(scheduled_at) <= datetime(?1)"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![to_storage(now)], row_to_reminder)?;

            let mut candidates = Vec::new();
            for r in rows {
                candidates.push(r?);
            }
            candidates
        };

        Ok(select_due(candidates, now, horizon))
    }

    // -----------------------------------------------------------------------
    // Interval sessions
    // -----------------------------------------------------------------------

    /// Append a session to the log.
    pub fn add_session(&self, session: &NewSession) -> Result<i64, StoreError> {
        if session.rounds == 0 {
            return Err(StoreError::InvalidValue(
                "session must have at least one round".to_owned(),
            ));
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO interval_sessions \
             (started_at, kind, rounds, work_secs, rest_secs, completed) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                to_storage(session.started_at),
                session.kind.as_str(),
                session.rounds,
                session.work_secs,
                session.rest_secs,
                session.completed,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Number of completed sessions that started on `day`, optionally of one kind.
    pub fn count_completed_sessions_on(
        &self,
        day: NaiveDate,
        kind: Option<TimerKind>,
    ) -> Result<u32, StoreError> {
        let conn = self.lock()?;
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM interval_sessions \
             WHERE date(started_at) = date(?1) AND completed = 1 \
             AND (?2 IS NULL OR kind = ?2)",
            params![day.format("%Y-%m-%d").to_string(), kind.map(TimerKind::as_str)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Sessions that started on `day`, oldest first.
    pub fn list_sessions_on(&self, day: NaiveDate) -> Result<Vec<IntervalSession>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM interval_sessions \
             WHERE date(started_at) = date(?1) ORDER BY started_at ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![day.format("%Y-%m-%d").to_string()],
            row_to_session,
        )?;

        let mut sessions = Vec::new();
        for r in rows {
            sessions.push(r?);
        }
        Ok(sessions)
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    /// Acquire the connection mutex.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

/// Reject blank titles. The title is stored exactly as given.
fn validated_title(title: &str) -> Result<&str, StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::InvalidValue("title must not be empty".to_owned()));
    }
    Ok(title)
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from the SQLite reminder store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("reminder not found: {0}")]
    NotFound(i64),

    #[error("reminder has no id; it must be added before it can be updated")]
    MissingId,

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("lock poisoned: {0}")]
    Lock(String),
}

// ---------------------------------------------------------------------------
// Row conversion helpers
// ---------------------------------------------------------------------------

fn row_to_reminder(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reminder> {
    let id: i64 = row.get(0)?;
    let description: Option<String> = row.get(2)?;
    let scheduled_raw: String = row.get(3)?;
    let repeat_raw: String = row.get(4)?;
    let last_fired_raw: Option<String> = row.get(6)?;

    let last_fired_at = match last_fired_raw {
        Some(raw) => Some(parse_column(6, &raw)?),
        None => None,
    };

    Ok(Reminder {
        id: Some(id),
        title: row.get(1)?,
        description: description.unwrap_or_default(),
        scheduled_at: parse_column(3, &scheduled_raw)?,
        repeat: str_to_repeat(id, &repeat_raw),
        enabled: row.get(5)?,
        last_fired_at,
    })
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<IntervalSession> {
    let started_raw: String = row.get(1)?;
    let kind_raw: String = row.get(2)?;
    let kind = kind_raw
        .parse::<TimerKind>()
        .unwrap_or(TimerKind::Tabata); // rows predating the kind column were all Tabata

    Ok(IntervalSession {
        id: row.get(0)?,
        started_at: parse_column(1, &started_raw)?,
        kind,
        rounds: row.get(3)?,
        work_secs: row.get(4)?,
        rest_secs: row.get(5)?,
        completed: row.get(6)?,
    })
}

fn parse_column(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    from_storage(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Unknown rules are written by nothing in this crate; a row carrying one
/// was edited by hand and behaves as a one-shot.
fn str_to_repeat(id: i64, raw: &str) -> Repeat {
    match raw.parse::<Repeat>() {
        Ok(rule) => rule,
        Err(e) => {
            warn!(id, "{e}; treating reminder as one-shot");
            Repeat::None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
