//! Configuration types for the reminder agenda.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AgendaError;
use crate::export::{DEFAULT_EVENT_MINUTES, MAX_EVENT_MINUTES};
use crate::scheduler::{DEFAULT_HORIZON_SECS, DEFAULT_POLL_INTERVAL_SECS};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgendaConfig {
    /// Poller timing.
    pub scheduler: SchedulerConfig,
    /// Database location.
    pub storage: StorageConfig,
    /// How alerts reach the user.
    pub notifications: NotificationConfig,
    /// Calendar export settings.
    pub export: ExportConfig,
}

/// Poller timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between polls. A reminder fires at most this late.
    pub poll_interval_secs: u64,
    /// Seconds after a firing during which the same reminder is not
    /// selected again. Widened to the poll interval if smaller.
    pub debounce_horizon_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            debounce_horizon_secs: DEFAULT_HORIZON_SECS as u64,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn debounce_horizon(&self) -> chrono::Duration {
        const MAX_SECS: u64 = 366 * 24 * 3600;
        chrono::Duration::seconds(self.debounce_horizon_secs.min(MAX_SECS) as i64)
    }

    /// Debounce horizon widened to the poll interval, as the poller applies it.
    pub fn effective_horizon(&self) -> chrono::Duration {
        crate::scheduler::effective_horizon(self.debounce_horizon(), self.poll_interval())
    }
}

/// Database location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file (None = `<data_dir>/agenda.db`).
    pub database_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(crate::app_dirs::database_file)
    }
}

/// Alert delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Desktop notifier program, run as `command args… <title> <message>`
    /// (None = log only).
    pub command: Option<String>,
    /// Extra arguments placed before title and message.
    pub args: Vec<String>,
}

/// Calendar export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory for `.ics` files (None = `<data_dir>/exports`).
    pub ics_dir: Option<PathBuf>,
    /// Length of exported calendar events in minutes.
    pub event_minutes: i64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            ics_dir: None,
            event_minutes: DEFAULT_EVENT_MINUTES,
        }
    }
}

impl ExportConfig {
    pub fn resolved_ics_dir(&self) -> PathBuf {
        self.ics_dir.clone().unwrap_or_else(crate::app_dirs::exports_dir)
    }
}

impl AgendaConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| AgendaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`AgendaConfig::from_file`], but a missing file yields defaults.
    pub fn load_or_default(path: &Path) -> crate::error::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AgendaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the poller or exporter cannot work with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.scheduler.poll_interval_secs == 0 {
            return Err(AgendaError::Config(
                "scheduler.poll_interval_secs must be at least 1".to_owned(),
            ));
        }
        if !(1..=MAX_EVENT_MINUTES).contains(&self.export.event_minutes) {
            return Err(AgendaError::Config(format!(
                "export.event_minutes must be between 1 and {MAX_EVENT_MINUTES}"
            )));
        }
        Ok(())
    }

    /// Returns the default config file path: `<config_dir>/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_file()
    }
}
