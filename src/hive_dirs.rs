//! Centralized application directory paths for Hive.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! # Directory Layout
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/hive/` | `~/.local/share/hive/` |
//! | Config | `~/Library/Application Support/hive/` | `~/.config/hive/` |
//!
//! # Environment Overrides
//!
//! - `HIVE_DATA_DIR`: overrides [`data_dir`]
//! - `HIVE_CONFIG_DIR`: overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Holds the durable state slots (preferences, handle ledgers, cached
/// task snapshot) and logs.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("HIVE_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("hive"))
        .unwrap_or_else(|| PathBuf::from("/tmp/hive-data"))
}

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("HIVE_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("hive"))
        .unwrap_or_else(|| PathBuf::from("/tmp/hive-config"))
}

/// Durable state slot directory (`data_dir()/state/`).
#[must_use]
pub fn state_dir() -> PathBuf {
    data_dir().join("state")
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
