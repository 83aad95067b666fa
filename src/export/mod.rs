//! Exporting reminders to external calendars.
//!
//! Export is user-triggered; the poller never calls into it. Each channel
//! implements [`ExportSink`] and reports its own outcome, so one failing
//! channel never hides the result of another.

pub mod ics;

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::warn;

use crate::config::ExportConfig;

pub use ics::{DEFAULT_EVENT_MINUTES, IcsExporter, IcsKind, MAX_EVENT_MINUTES};

/// Errors from an export channel.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export title must not be empty")]
    EmptyTitle,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no export channels configured")]
    NoChannels,

    #[error("all {0} export channels failed")]
    AllFailed(usize),

    #[error("event length of {0} minutes puts its end out of range")]
    EventOutOfRange(i64),
}

/// Per-channel outcome of one export: remote id on success, message on
/// failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub channels: BTreeMap<String, Result<String, String>>,
}

impl ExportReport {
    pub fn record(&mut self, channel: impl Into<String>, outcome: Result<String, ExportError>) {
        self.channels
            .insert(channel.into(), outcome.map_err(|e| e.to_string()));
    }

    /// Channels that succeeded, with their ids.
    pub fn ids(&self) -> impl Iterator<Item = (&str, &str)> {
        self.channels
            .iter()
            .filter_map(|(k, v)| v.as_ref().ok().map(|id| (k.as_str(), id.as_str())))
    }

    /// Channels that failed, with their messages.
    pub fn errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.channels
            .iter()
            .filter_map(|(k, v)| v.as_ref().err().map(|msg| (k.as_str(), msg.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// True when at least one channel succeeded.
    pub fn any_succeeded(&self) -> bool {
        self.ids().next().is_some()
    }

    /// Turn a report with no successful channel into an error.
    pub fn into_result(self) -> Result<Self, ExportError> {
        if self.is_empty() {
            Err(ExportError::NoChannels)
        } else if self.any_succeeded() {
            Ok(self)
        } else {
            Err(ExportError::AllFailed(self.channels.len()))
        }
    }
}

/// A reminder as handed to an export channel.
#[derive(Debug, Clone, Copy)]
pub struct ExportItem<'a> {
    pub title: &'a str,
    pub when: NaiveDateTime,
    pub notes: &'a str,
}

/// An export destination.
pub trait ExportSink: Send + Sync {
    /// Name used as the key in [`ExportReport`].
    fn channel(&self) -> &str;

    /// Export one item, returning the id it was stored under.
    fn export(&self, item: &ExportItem<'_>) -> Result<String, ExportError>;

    /// Export and wrap the outcome into a report.
    fn export_reminder(&self, title: &str, when: NaiveDateTime, notes: &str) -> ExportReport {
        let mut report = ExportReport::default();
        let item = ExportItem { title, when, notes };
        report.record(self.channel(), self.export(&item));
        report
    }
}

/// Build the exporter described by the `[export]` config section: an event
/// and a task file per export.
pub fn from_config(config: &ExportConfig) -> MultiExporter {
    let dir = config.resolved_ics_dir();
    MultiExporter::new()
        .with(IcsExporter::events(&dir).with_event_minutes(config.event_minutes))
        .with(IcsExporter::tasks(&dir))
}

/// Exports to several channels, collecting every channel's outcome.
#[derive(Default)]
pub struct MultiExporter {
    sinks: Vec<Box<dyn ExportSink>>,
}

impl MultiExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ExportSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ExportSink for MultiExporter {
    fn channel(&self) -> &str {
        "multi"
    }

    /// Id from the first channel that succeeds.
    fn export(&self, item: &ExportItem<'_>) -> Result<String, ExportError> {
        let report = self.export_reminder(item.title, item.when, item.notes);
        let report = report.into_result()?;
        report
            .ids()
            .next()
            .map(|(_, id)| id.to_owned())
            .ok_or(ExportError::NoChannels)
    }

    fn export_reminder(&self, title: &str, when: NaiveDateTime, notes: &str) -> ExportReport {
        let item = ExportItem { title, when, notes };
        let mut report = ExportReport::default();
        for sink in &self.sinks {
            let outcome = sink.export(&item);
            if let Err(e) = &outcome {
                warn!(channel = sink.channel(), "export failed: {e}");
            }
            report.record(sink.channel(), outcome);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::NaiveDate;

    struct Fixed(&'static str, Option<&'static str>);

    impl ExportSink for Fixed {
        fn channel(&self) -> &str {
            self.0
        }

        fn export(&self, _item: &ExportItem<'_>) -> Result<String, ExportError> {
            self.1.map(str::to_owned).ok_or(ExportError::EmptyTitle)
        }
    }

    fn when() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn single_sink_reports_its_channel() {
        let report = Fixed("cal", Some("id-1")).export_reminder("t", when(), "");
        assert_eq!(report.ids().collect::<Vec<_>>(), vec![("cal", "id-1")]);
        assert!(report.errors().next().is_none());
    }

    #[test]
    fn multi_keeps_going_after_a_failure() {
        let multi = MultiExporter::new()
            .with(Fixed("broken", None))
            .with(Fixed("cal", Some("id-2")));
        let report = multi.export_reminder("t", when(), "");
        assert_eq!(report.channels.len(), 2);
        assert_eq!(report.ids().collect::<Vec<_>>(), vec![("cal", "id-2")]);
        assert_eq!(report.errors().count(), 1);
        assert!(report.clone().into_result().is_ok());
        assert_eq!(multi.export(&ExportItem { title: "t", when: when(), notes: "" }).unwrap(), "id-2");
    }

    #[test]
    fn all_failed_is_an_error() {
        let multi = MultiExporter::new()
            .with(Fixed("a", None))
            .with(Fixed("b", None));
        let report = multi.export_reminder("t", when(), "");
        assert!(matches!(report.into_result(), Err(ExportError::AllFailed(2))));
    }

    #[test]
    fn empty_multi_has_no_channels() {
        let report = MultiExporter::new().export_reminder("t", when(), "");
        assert!(matches!(report.into_result(), Err(ExportError::NoChannels)));
    }

    #[test]
    fn from_config_writes_event_and_task() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExportConfig {
            ics_dir: Some(dir.path().to_path_buf()),
            event_minutes: 45,
        };
        let report = from_config(&config).export_reminder("Dentist", when(), "bring card");
        assert_eq!(
            report.channels.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["ics-event", "ics-task"]
        );
        assert!(report.errors().next().is_none());

        let event = std::fs::read_to_string(dir.path().join("event-20240105T0900-dentist.ics")).unwrap();
        assert!(event.contains("DTEND:20240105T094500"));
        assert!(dir.path().join("task-20240105T0900-dentist.ics").exists());
    }

    #[test]
    fn out_of_range_event_length_lands_in_the_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExportConfig {
            ics_dir: Some(dir.path().to_path_buf()),
            event_minutes: i64::MAX,
        };
        let report = from_config(&config).export_reminder("Dentist", when(), "");
        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "ics-event");
        assert!(errors[0].1.contains("out of range"));
        assert!(report.ids().any(|(channel, _)| channel == "ics-task"));
    }

    #[test]
    fn report_serializes_ok_and_err() {
        let mut report = ExportReport::default();
        report.record("a", Ok("x".to_owned()));
        report.record("b", Err(ExportError::EmptyTitle));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["channels"]["a"]["Ok"], "x");
        assert_eq!(json["channels"]["b"]["Err"], "export title must not be empty");
    }
}
