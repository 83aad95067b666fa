//! iCalendar (`.ics`) file export.
//!
//! Each export writes one calendar file holding a single `VEVENT` or
//! `VTODO`. Times are written as floating local time, matching how the
//! store keeps them.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use tracing::debug;

use super::{ExportError, ExportItem, ExportSink};

/// Default event length in minutes.
pub const DEFAULT_EVENT_MINUTES: i64 = 30;

/// Longest event length accepted from configuration (one week).
pub const MAX_EVENT_MINUTES: i64 = 7 * 24 * 60;

const PRODID: &str = "-//agenda//reminder export//EN";
const ICS_DATETIME: &str = "%Y%m%dT%H%M%S";
const MAX_LINE_OCTETS: usize = 75;

/// Component written by an [`IcsExporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcsKind {
    /// `VEVENT` with a start and an end.
    Event,
    /// `VTODO` due at the reminder time.
    Task,
}

impl IcsKind {
    fn channel(self) -> &'static str {
        match self {
            Self::Event => "ics-event",
            Self::Task => "ics-task",
        }
    }

    fn file_prefix(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Task => "task",
        }
    }
}

/// Writes reminders as `.ics` files into a directory.
#[derive(Debug, Clone)]
pub struct IcsExporter {
    dir: PathBuf,
    kind: IcsKind,
    event_minutes: i64,
}

impl IcsExporter {
    pub fn events(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            kind: IcsKind::Event,
            event_minutes: DEFAULT_EVENT_MINUTES,
        }
    }

    pub fn tasks(dir: impl AsRef<Path>) -> Self {
        Self {
            kind: IcsKind::Task,
            ..Self::events(dir)
        }
    }

    /// Override the event length in minutes. Ignored for tasks.
    pub fn with_event_minutes(mut self, minutes: i64) -> Self {
        self.event_minutes = minutes;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Render the calendar text for `item` under `uid`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::EventOutOfRange`] when the event end cannot be
    /// represented.
    pub fn render(&self, item: &ExportItem<'_>, uid: &str) -> Result<String, ExportError> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let mut lines = vec![
            "BEGIN:VCALENDAR".to_owned(),
            "VERSION:2.0".to_owned(),
            format!("PRODID:{PRODID}"),
        ];
        match self.kind {
            IcsKind::Event => {
                let end = Duration::try_minutes(self.event_minutes)
                    .and_then(|length| item.when.checked_add_signed(length))
                    .ok_or(ExportError::EventOutOfRange(self.event_minutes))?;
                lines.push("BEGIN:VEVENT".to_owned());
                lines.push(format!("UID:{uid}"));
                lines.push(format!("DTSTAMP:{stamp}"));
                lines.push(format!("DTSTART:{}", item.when.format(ICS_DATETIME)));
                lines.push(format!("DTEND:{}", end.format(ICS_DATETIME)));
            }
            IcsKind::Task => {
                lines.push("BEGIN:VTODO".to_owned());
                lines.push(format!("UID:{uid}"));
                lines.push(format!("DTSTAMP:{stamp}"));
                lines.push(format!("DUE:{}", item.when.format(ICS_DATETIME)));
                lines.push("STATUS:NEEDS-ACTION".to_owned());
            }
        }
        lines.push(format!("SUMMARY:{}", escape_text(item.title)));
        if !item.notes.trim().is_empty() {
            lines.push(format!("DESCRIPTION:{}", escape_text(item.notes)));
        }
        lines.push(match self.kind {
            IcsKind::Event => "END:VEVENT".to_owned(),
            IcsKind::Task => "END:VTODO".to_owned(),
        });
        lines.push("END:VCALENDAR".to_owned());

        let mut out = String::new();
        for line in lines {
            out.push_str(&fold_line(&line));
            out.push_str("\r\n");
        }
        Ok(out)
    }

    fn unique_path(&self, base: &str) -> PathBuf {
        let mut path = self.dir.join(format!("{base}.ics"));
        let mut n = 2;
        while path.exists() {
            path = self.dir.join(format!("{base}-{n}.ics"));
            n += 1;
        }
        path
    }
}

impl ExportSink for IcsExporter {
    fn channel(&self) -> &str {
        self.kind.channel()
    }

    fn export(&self, item: &ExportItem<'_>) -> Result<String, ExportError> {
        let title = item.title.trim();
        if title.is_empty() {
            return Err(ExportError::EmptyTitle);
        }
        std::fs::create_dir_all(&self.dir)?;

        let base = format!(
            "{}-{}-{}",
            self.kind.file_prefix(),
            item.when.format("%Y%m%dT%H%M"),
            slug(title)
        );
        let path = self.unique_path(&base);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(base);
        let uid = format!("{stem}@agenda");

        let text = self.render(item, &uid)?;
        std::fs::write(&path, text)?;
        debug!(path = %path.display(), uid = %uid, "wrote calendar file");
        Ok(uid)
    }
}

/// Escape a TEXT value (RFC 5545 §3.3.11).
fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

/// Fold a content line at 75 octets without splitting a UTF-8 sequence.
fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_owned();
    }
    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut width = 0;
    for c in line.chars() {
        // Continuation lines start with a space, which counts toward the limit.
        if width + c.len_utf8() > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width += c.len_utf8();
    }
    out
}

fn slug(title: &str) -> String {
    let mut out = String::new();
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
        if out.len() >= 32 {
            break;
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "reminder".to_owned()
    } else {
        trimmed.to_owned()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn when() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn item<'a>(title: &'a str, notes: &'a str) -> ExportItem<'a> {
        ExportItem {
            title,
            when: when(),
            notes,
        }
    }

    #[test]
    fn event_has_thirty_minute_default_length() {
        let dir = tempfile::tempdir().unwrap();
        let text = IcsExporter::events(dir.path())
            .render(&item("Dentist", ""), "u@agenda")
            .unwrap();
        assert!(text.contains("BEGIN:VEVENT\r\n"));
        assert!(text.contains("DTSTART:20240105T090000\r\n"));
        assert!(text.contains("DTEND:20240105T093000\r\n"));
        assert!(text.contains("SUMMARY:Dentist\r\n"));
        assert!(!text.contains("DESCRIPTION"));
        assert!(text.ends_with("END:VCALENDAR\r\n"));
    }

    #[test]
    fn task_uses_due_instead_of_start() {
        let dir = tempfile::tempdir().unwrap();
        let text = IcsExporter::tasks(dir.path())
            .render(&item("Pay rent", "by card"), "u")
            .unwrap();
        assert!(text.contains("BEGIN:VTODO\r\n"));
        assert!(text.contains("DUE:20240105T090000\r\n"));
        assert!(text.contains("DESCRIPTION:by card\r\n"));
        assert!(!text.contains("DTSTART"));
    }

    #[test]
    fn custom_event_length_sets_end() {
        let dir = tempfile::tempdir().unwrap();
        let text = IcsExporter::events(dir.path())
            .with_event_minutes(90)
            .render(&item("Dentist", ""), "u")
            .unwrap();
        assert!(text.contains("DTEND:20240105T103000\r\n"));
    }

    #[test]
    fn unrepresentable_event_end_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = IcsExporter::events(dir.path()).with_event_minutes(i64::MAX);
        let result = exporter.export(&item("Dentist", ""));
        assert!(matches!(result, Err(ExportError::EventOutOfRange(i64::MAX))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        // Tasks have no end, so the same length is harmless there.
        let task = IcsExporter::tasks(dir.path()).with_event_minutes(i64::MAX);
        assert!(task.export(&item("Dentist", "")).is_ok());
    }

    #[test]
    fn export_writes_file_and_returns_uid() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = IcsExporter::events(dir.path().join("nested"));
        let uid = exporter.export(&item("Team sync", "")).unwrap();
        assert_eq!(uid, "event-20240105T0900-team-sync@agenda");

        let path = dir.path().join("nested/event-20240105T0900-team-sync.ics");
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains(&format!("UID:{uid}")));
    }

    #[test]
    fn repeated_export_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = IcsExporter::events(dir.path());
        let first = exporter.export(&item("Same", "")).unwrap();
        let second = exporter.export(&item("Same", "")).unwrap();
        assert_ne!(first, second);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn empty_title_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = IcsExporter::events(dir.path()).export(&item("  ", ""));
        assert!(matches!(result, Err(ExportError::EmptyTitle)));
    }

    #[test]
    fn text_values_are_escaped() {
        assert_eq!(escape_text("a,b;c\\d\r\ne"), "a\\,b\\;c\\\\d\\ne");
    }

    #[test]
    fn long_lines_fold_at_75_octets() {
        let line = format!("SUMMARY:{}", "é".repeat(60));
        let folded = fold_line(&line);
        for part in folded.split("\r\n") {
            assert!(part.len() <= MAX_LINE_OCTETS, "{} octets", part.len());
        }
        assert_eq!(folded.replace("\r\n ", ""), line);
    }

    #[test]
    fn slug_is_filename_safe() {
        assert_eq!(slug("Call Mom!!"), "call-mom");
        assert_eq!(slug("¿¿??"), "reminder");
    }
}
