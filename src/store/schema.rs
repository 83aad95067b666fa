//! SQLite DDL definitions for the agenda database.
//!
//! All `CREATE TABLE` / `CREATE INDEX` statements live here so they are
//! reviewable and testable in isolation.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

/// Complete DDL for the agenda database.
///
/// Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
pub(crate) const SCHEMA_SQL: &str = r#"
-- Enable WAL mode so the poller and interactive callers do not block reads.
PRAGMA journal_mode = WAL;

-- Schema version tracking.
CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Reminders. Timestamps are ISO-8601 minutes (YYYY-MM-DDTHH:MM).
CREATE TABLE IF NOT EXISTS reminders (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    title         TEXT NOT NULL,
    description   TEXT DEFAULT '',
    scheduled_at  TEXT NOT NULL,
    repeat        TEXT NOT NULL DEFAULT 'none',   -- none | daily | weekly | weekdays
    enabled       INTEGER NOT NULL DEFAULT 1,
    last_fired_at TEXT DEFAULT NULL
);

CREATE INDEX IF NOT EXISTS idx_reminders_due ON reminders(enabled, scheduled_at);

-- Append-only log of interval-timer sessions.
CREATE TABLE IF NOT EXISTS interval_sessions (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    kind       TEXT NOT NULL DEFAULT 'tabata',    -- pomodoro | tabata
    rounds     INTEGER NOT NULL,
    work_secs  INTEGER NOT NULL,
    rest_secs  INTEGER NOT NULL,
    completed  INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_sessions_started_at ON interval_sessions(started_at);
"#;

/// Version 1 layout: no `schema_meta`, reminders in `tasks`, and
/// tabata-only history in `tabata_sessions` with `work_sec` / `rest_sec`.
const V1_TO_V2_SQL: &[(&str, &str)] = &[
    (
        "tasks",
        "INSERT INTO reminders \
             (id, title, description, scheduled_at, repeat, enabled, last_fired_at) \
         SELECT id, title, COALESCE(description, ''), scheduled_at, repeat, enabled, \
                last_fired_at \
         FROM tasks; \
         DROP TABLE tasks;",
    ),
    (
        "tabata_sessions",
        "INSERT INTO interval_sessions \
             (id, started_at, kind, rounds, work_secs, rest_secs, completed) \
         SELECT id, started_at, 'tabata', rounds, work_sec, rest_sec, completed \
         FROM tabata_sessions; \
         DROP TABLE tabata_sessions;",
    ),
];

/// Apply the full schema to an open connection.
///
/// Safe to call multiple times; all statements use `IF NOT EXISTS`.
/// A database without a version row has its version 1 tables moved into
/// the current layout before the current version is recorded. The move and
/// the version row commit together.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    let tx = conn.unchecked_transaction()?;
    if read_schema_version(&tx)?.is_none() {
        migrate_v1_tables(&tx)?;
    }
    let version_str = super::types::CURRENT_SCHEMA_VERSION.to_string();
    tx.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![version_str],
    )?;
    tx.commit()
}

fn migrate_v1_tables(conn: &Connection) -> rusqlite::Result<()> {
    for (table, sql) in V1_TO_V2_SQL {
        if table_exists(conn, table)? {
            conn.execute_batch(sql)?;
            info!(table, "migrated version 1 table");
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        rusqlite::params![name],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

/// Read the current schema version from the database.
///
/// Returns `None` if the `schema_meta` table is empty or the key is missing.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_schema_creates_tables() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        apply_schema(&conn).expect("first apply_schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .expect("prepare")
            .query_map([], |row| row.get(0))
            .expect("query")
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"reminders".to_owned()));
        assert!(tables.contains(&"interval_sessions".to_owned()));
        assert!(tables.contains(&"schema_meta".to_owned()));
    }

    #[test]
    fn apply_schema_is_idempotent() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        apply_schema(&conn).expect("first apply_schema");
        apply_schema(&conn).expect("second apply_schema (idempotent)");
    }

    #[test]
    fn schema_version_is_seeded() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        apply_schema(&conn).expect("apply_schema");

        let version = read_schema_version(&conn)
            .expect("read_schema_version")
            .expect("version should exist");

        assert_eq!(version, super::super::types::CURRENT_SCHEMA_VERSION);
    }

    fn version_1_database() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        conn.execute_batch(
            "CREATE TABLE tasks (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 title TEXT NOT NULL,
                 description TEXT DEFAULT '',
                 scheduled_at TEXT NOT NULL,
                 repeat TEXT NOT NULL DEFAULT 'none',
                 enabled INTEGER NOT NULL DEFAULT 1,
                 last_fired_at TEXT DEFAULT NULL
             );
             CREATE TABLE tabata_sessions (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 started_at TEXT NOT NULL,
                 rounds INTEGER NOT NULL,
                 work_sec INTEGER NOT NULL,
                 rest_sec INTEGER NOT NULL,
                 completed INTEGER NOT NULL DEFAULT 1
             );
             INSERT INTO tasks (id, title, description, scheduled_at, repeat, enabled, last_fired_at)
                 VALUES (7, 'Water plants', NULL, '2024-01-05T18:00', 'daily', 1, '2024-01-04T18:00');
             INSERT INTO tabata_sessions (id, started_at, rounds, work_sec, rest_sec, completed)
                 VALUES (3, '2024-01-05T07:00', 8, 20, 10, 1);",
        )
        .expect("seed version 1 tables");
        conn
    }

    #[test]
    fn version_1_tables_move_into_current_layout() {
        let conn = version_1_database();
        apply_schema(&conn).expect("apply_schema");

        assert!(!table_exists(&conn, "tasks").expect("exists"));
        assert!(!table_exists(&conn, "tabata_sessions").expect("exists"));
        assert_eq!(
            read_schema_version(&conn).expect("version"),
            Some(super::super::types::CURRENT_SCHEMA_VERSION)
        );

        let reminder: (i64, String, String, String, Option<String>) = conn
            .query_row(
                "SELECT id, title, description, repeat, last_fired_at FROM reminders",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .expect("reminder row");
        assert_eq!(
            reminder,
            (
                7,
                "Water plants".to_owned(),
                String::new(),
                "daily".to_owned(),
                Some("2024-01-04T18:00".to_owned())
            )
        );

        let session: (i64, String, i64, i64) = conn
            .query_row(
                "SELECT id, kind, work_secs, rest_secs FROM interval_sessions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .expect("session row");
        assert_eq!(session, (3, "tabata".to_owned(), 20, 10));

        // A second open leaves the migrated rows alone.
        apply_schema(&conn).expect("second apply_schema");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM reminders", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn reminder_defaults_match_new_rows() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        apply_schema(&conn).expect("apply_schema");
        conn.execute(
            "INSERT INTO reminders (title, scheduled_at) VALUES ('t', '2024-01-05T09:00')",
            [],
        )
        .expect("insert");

        let (repeat, enabled, fired): (String, i64, Option<String>) = conn
            .query_row(
                "SELECT repeat, enabled, last_fired_at FROM reminders",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .expect("select");
        assert_eq!(repeat, "none");
        assert_eq!(enabled, 1);
        assert!(fired.is_none());
    }
}
