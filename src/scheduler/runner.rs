//! Reminder poller.
//!
//! Spawns a tokio task that wakes every poll interval, asks the store for
//! due reminders, fires each one through the notification sink and writes
//! the resulting state back.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{AgendaError, Result};
use crate::notify::{NotificationSink, REMINDER_TITLE};
use crate::scheduler::due::{default_horizon, effective_horizon};
use crate::scheduler::recurrence::next_occurrence_after;
use crate::store::{Reminder, ReminderStore};
use crate::time::{now_minute, to_display, truncate_to_minute};

/// Default interval between polls (seconds).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 20;

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Lifecycle state of a [`Poller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Stopped,
    Running,
}

/// Outcome of one poll iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Reminders selected as due.
    pub due: usize,
    /// Reminders whose fire transition was written back.
    pub fired: usize,
    /// Repeating reminders moved to their next occurrence.
    pub rescheduled: usize,
    /// One-shot reminders disabled after firing.
    pub disabled: usize,
    /// Sink errors (the transition still proceeds).
    pub delivery_failures: usize,
    /// Transitions that could not be persisted; retried next poll.
    pub persist_failures: usize,
}

impl TickReport {
    fn is_quiet(&self) -> bool {
        self.due == 0
    }
}

#[derive(Clone)]
struct PollerCore {
    store: Arc<ReminderStore>,
    sink: Arc<dyn NotificationSink>,
    poll_interval: Duration,
    horizon: chrono::Duration,
    clock: Clock,
}

/// Background loop that fires due reminders.
///
/// Created stopped. [`Poller::start`] spawns the loop on the current tokio
/// runtime, [`Poller::stop`] asks it to exit after the in-flight iteration
/// and [`Poller::shutdown`] additionally waits for it.
pub struct Poller {
    core: PollerCore,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Create a stopped poller over `store` delivering to `sink`.
    pub fn new(store: Arc<ReminderStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            core: PollerCore {
                store,
                sink,
                poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
                horizon: default_horizon(),
                clock: Arc::new(now_minute),
            },
            cancel: None,
            handle: None,
        }
    }

    /// Override the poll interval. Zero is raised to one millisecond.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.core.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Override the debounce horizon used for due-set selection.
    pub fn with_horizon(mut self, horizon: chrono::Duration) -> Self {
        self.core.horizon = horizon;
        self
    }

    /// Replace the wall clock, e.g. with a fixed time in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.core.clock = clock;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.core.poll_interval
    }

    /// Horizon actually used for selection: the configured horizon, widened
    /// to at least one poll interval.
    pub fn effective_horizon(&self) -> chrono::Duration {
        self.core.effective_horizon()
    }

    pub fn state(&self) -> PollerState {
        let running = match (&self.cancel, &self.handle) {
            (Some(cancel), Some(handle)) => !cancel.is_cancelled() && !handle.is_finished(),
            _ => false,
        };
        if running {
            PollerState::Running
        } else {
            PollerState::Stopped
        }
    }

    /// Spawn the poll loop on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails if the loop is already running or no runtime is available.
    pub fn start(&mut self) -> Result<()> {
        if self.state() == PollerState::Running {
            return Err(AgendaError::Scheduler("poller already running".to_owned()));
        }
        let runtime = Handle::try_current()
            .map_err(|e| AgendaError::Scheduler(format!("no tokio runtime: {e}")))?;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let core = self.core.clone();

        let handle = runtime.spawn(async move {
            info!(
                interval_ms = core.poll_interval.as_millis() as u64,
                horizon_secs = core.effective_horizon().num_seconds(),
                "reminder poller started"
            );
            while !token.is_cancelled() {
                // Sinks and the store block; keep them off the async workers.
                let iteration = core.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || iteration.poll_guarded()).await
                {
                    error!("poll iteration did not run: {e}");
                }
                tokio::select! {
                    () = token.cancelled() => break,
                    () = tokio::time::sleep(core.poll_interval) => {}
                }
            }
            info!("reminder poller stopped");
        });

        self.cancel = Some(cancel);
        self.handle = Some(handle);
        Ok(())
    }

    /// Signal the loop to exit. An iteration already in progress completes.
    pub fn stop(&self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
    }

    /// Stop the loop and wait for the task to finish.
    pub async fn shutdown(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!("poller task panicked: {e}");
                }
            }
        }
        self.cancel = None;
    }

    /// Run one iteration against the configured clock.
    pub fn poll_once(&self) -> TickReport {
        self.core.tick((self.core.clock)())
    }

    /// Run one iteration as if the current time were `now`.
    pub fn tick(&self, now: NaiveDateTime) -> TickReport {
        self.core.tick(now)
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

impl PollerCore {
    fn effective_horizon(&self) -> chrono::Duration {
        effective_horizon(self.horizon, self.poll_interval)
    }

    /// One loop iteration with panics contained.
    fn poll_guarded(&self) {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let now = (self.clock)();
            self.tick(now)
        }));
        match outcome {
            Ok(report) if report.is_quiet() => {}
            Ok(report) => debug!(?report, "poll complete"),
            Err(panic) => error!("poll iteration panicked: {}", panic_message(&*panic)),
        }
    }

    fn tick(&self, now: NaiveDateTime) -> TickReport {
        let now = truncate_to_minute(now);
        let mut report = TickReport::default();

        let due = match self.store.due_reminders(now, self.effective_horizon()) {
            Ok(due) => due,
            Err(e) => {
                error!("cannot load due reminders: {e}");
                return report;
            }
        };
        report.due = due.len();

        for reminder in due {
            let id = reminder.id;
            let fired = catch_unwind(AssertUnwindSafe(|| self.fire(reminder, now, &mut report)));
            if let Err(panic) = fired {
                error!(?id, "firing reminder panicked: {}", panic_message(&*panic));
            }
        }
        report
    }

    /// Deliver, roll over and persist a single due reminder.
    fn fire(&self, mut reminder: Reminder, now: NaiveDateTime, report: &mut TickReport) {
        let id = reminder.id;

        if let Err(e) = self.sink.deliver(REMINDER_TITLE, &reminder.title) {
            warn!(?id, "reminder delivery failed: {e}");
            report.delivery_failures += 1;
        }

        let next = next_occurrence_after(&reminder, now);
        reminder.last_fired_at = Some(now);
        match next {
            Some(next) => {
                reminder.scheduled_at = next;
                reminder.enabled = true;
            }
            None => reminder.enabled = false,
        }

        if let Err(e) = self.store.update_reminder(&reminder) {
            error!(?id, "cannot persist fired reminder: {e}");
            report.persist_failures += 1;
            return;
        }

        report.fired += 1;
        match next {
            Some(next) => {
                report.rescheduled += 1;
                info!(?id, title = %reminder.title, next = %to_display(next), "reminder fired");
            }
            None => {
                report.disabled += 1;
                info!(?id, title = %reminder.title, "one-shot reminder fired and disabled");
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
