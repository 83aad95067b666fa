//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate locations.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Data (database, logs, exports) | `~/Library/Application Support/agenda/` | `~/.local/share/agenda/` |
//! | Config | `~/Library/Application Support/agenda/` | `~/.config/agenda/` |
//!
//! # Environment Overrides
//!
//! - `AGENDA_DATA_DIR` overrides [`data_dir`]
//! - `AGENDA_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

use crate::store::DB_FILENAME;

/// Application data root directory.
///
/// Resolves to `dirs::data_dir()/agenda/` by default. Override with the
/// `AGENDA_DATA_DIR` environment variable.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("AGENDA_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("agenda"))
        .unwrap_or_else(|| PathBuf::from("/tmp/agenda-data"))
}

/// Application config directory.
///
/// Resolves to `dirs::config_dir()/agenda/` by default. Override with the
/// `AGENDA_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("AGENDA_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("agenda"))
        .unwrap_or_else(|| PathBuf::from("/tmp/agenda-config"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Default calendar export directory (`data_dir()/exports/`).
#[must_use]
pub fn exports_dir() -> PathBuf {
    data_dir().join("exports")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default reminder database path (`data_dir()/agenda.db`).
#[must_use]
pub fn database_file() -> PathBuf {
    data_dir().join(DB_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_is_nonempty() {
        assert!(!data_dir().as_os_str().is_empty());
    }

    #[test]
    fn config_dir_is_nonempty() {
        assert!(!config_dir().as_os_str().is_empty());
    }

    #[test]
    fn config_file_ends_with_config_toml() {
        let path = config_file();
        let s = path.to_string_lossy();
        assert!(s.ends_with("config.toml"), "config_file: {s}");
    }

    #[test]
    fn database_file_is_in_data_dir() {
        let db = database_file();
        assert!(db.starts_with(data_dir()));
        assert!(db.to_string_lossy().ends_with("agenda.db"));
    }

    #[test]
    fn logs_and_exports_are_subpaths_of_data_dir() {
        let data = data_dir();
        for dir in [logs_dir(), exports_dir()] {
            assert!(
                dir.starts_with(&data),
                "{} should start with data_dir ({})",
                dir.display(),
                data.display()
            );
        }
    }
}
