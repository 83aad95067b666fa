//! Error types for the agenda engine.

use crate::export::ExportError;
use crate::notify::NotifyError;
use crate::store::StoreError;

/// Top-level error type for the reminder agenda.
#[derive(Debug, thiserror::Error)]
pub enum AgendaError {
    /// Reminder or session persistence error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// User input rejected before it reaches the scheduler.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Notification delivery error.
    #[error("notify error: {0}")]
    Notify(#[from] NotifyError),

    /// Export channel error.
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// Poller lifecycle error (start/stop/join).
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AgendaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_converts_with_prefix() {
        let err: AgendaError = StoreError::NotFound(7).into();
        assert_eq!(err.to_string(), "store error: reminder not found: 7");
    }

    #[test]
    fn validation_error_display() {
        let err = AgendaError::Validation("bad date".to_owned());
        assert_eq!(err.to_string(), "validation error: bad date");
    }
}
