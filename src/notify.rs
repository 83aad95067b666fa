//! Notification sinks.
//!
//! The poller calls [`NotificationSink::deliver`] once per firing. How the
//! alert reaches the user is up to the implementation:
//!
//! - [`LogNotifier`] writes the alert to the tracing log
//! - [`CommandNotifier`] runs a desktop notifier such as `notify-send`
//! - [`FanoutNotifier`] delivers to several sinks
//! - [`RecordingNotifier`] keeps alerts in memory for tests and embedders

use std::process::Command;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::config::NotificationConfig;

/// Title used for every reminder alert.
pub const REMINDER_TITLE: &str = "Reminder";

/// Errors from a notification sink.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The notifier program could not be started.
    #[error("cannot run notifier '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The notifier ran but reported failure.
    #[error("notifier '{program}' exited with {status}")]
    Failed { program: String, status: String },

    /// Every sink in a fan-out failed.
    #[error("all {0} notification sinks failed")]
    AllFailed(usize),

    /// Sink-specific failure.
    #[error("{0}")]
    Backend(String),
}

/// Destination for reminder alerts.
pub trait NotificationSink: Send + Sync {
    /// Deliver one alert. Errors are logged by the caller and never stop a
    /// firing.
    fn deliver(&self, title: &str, message: &str) -> Result<(), NotifyError>;
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    fn deliver(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        (**self).deliver(title, message)
    }
}

// ─── LogNotifier ──────────────────────────────────────────────────────────────

/// Writes alerts to the log at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn deliver(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        info!(target: "agenda::alert", title, message, "reminder alert");
        Ok(())
    }
}

// ─── CommandNotifier ──────────────────────────────────────────────────────────

/// Runs an external program with `args… <title> <message>`.
///
/// The call blocks until the program exits; a notifier that hangs stalls
/// the poll iteration that invoked it.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `notify-send --app-name=agenda <title> <message>`.
    pub fn notify_send() -> Self {
        Self::new("notify-send", vec!["--app-name=agenda".to_owned()])
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl NotificationSink for CommandNotifier {
    fn deliver(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        debug!(program = %self.program, "running notifier");
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(title)
            .arg(message)
            .status()
            .map_err(|source| NotifyError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(NotifyError::Failed {
                program: self.program.clone(),
                status: status.to_string(),
            })
        }
    }
}

// ─── FanoutNotifier ───────────────────────────────────────────────────────────

/// Delivers to every inner sink; succeeds if at least one does.
#[derive(Default)]
pub struct FanoutNotifier {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl NotificationSink + 'static) -> Self {
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

impl NotificationSink for FanoutNotifier {
    fn deliver(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        let mut failures = 0;
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(title, message) {
                warn!("notification sink failed: {e}");
                failures += 1;
            }
        }
        if !self.sinks.is_empty() && failures == self.sinks.len() {
            return Err(NotifyError::AllFailed(failures));
        }
        Ok(())
    }
}

// ─── RecordingNotifier ────────────────────────────────────────────────────────

/// Keeps every delivered `(title, message)` pair in memory.
///
/// Can be told to fail, to exercise the poller's delivery-failure path.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that records the attempt and then returns an error.
    pub fn failing() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Snapshot of the alerts delivered so far.
    pub fn delivered(&self) -> Vec<(String, String)> {
        self.delivered
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

impl NotificationSink for RecordingNotifier {
    fn deliver(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .map_err(|_| NotifyError::Backend("recorder lock poisoned".to_owned()))?
            .push((title.to_owned(), message.to_owned()));
        if self.fail {
            return Err(NotifyError::Backend("configured to fail".to_owned()));
        }
        Ok(())
    }
}

/// Build the sink described by the `[notifications]` config section.
///
/// The log sink is always present so alerts are never silently lost; a
/// configured command is added next to it.
pub fn from_config(config: &NotificationConfig) -> FanoutNotifier {
    let fanout = FanoutNotifier::new().with(LogNotifier);
    match config.command.as_deref() {
        Some(program) if !program.trim().is_empty() => {
            fanout.with(CommandNotifier::new(program.trim(), config.args.clone()))
        }
        _ => fanout,
    }
}
