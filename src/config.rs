//! Configuration types for the reminder engine.

use crate::error::{HiveError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Smallest background interval the OS background-fetch facilities accept.
pub const MIN_PLATFORM_INTERVAL_SECS: u64 = 900;

/// Top-level configuration for the reminder engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Local times of day at which reminders fire.
    pub schedule: ScheduleConfig,
    /// Background trigger registration.
    pub background: BackgroundConfig,
    /// Notification payload and fallback texts.
    pub notifications: NotificationConfig,
}

/// Local fire times used by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Hour on the day before the due date for the "due tomorrow" reminder.
    pub day_before_hour: u32,
    /// Hour on the due date for the morning reminder.
    pub morning_hour: u32,
    /// Hour on the due date for the evening reminder (due-today only).
    pub evening_hour: u32,
    /// Hour of the daily recurring reminder for overdue tasks.
    pub overdue_hour: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            day_before_hour: 18,
            morning_hour: 9,
            evening_hour: 17,
            overdue_hour: 10,
        }
    }
}

/// Background trigger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Name under which the periodic trigger is registered.
    pub task_name: String,
    /// Lower bound applied to the cadence-derived interval, in seconds.
    pub platform_floor_secs: u64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            task_name: "task-reminder-background".to_owned(),
            platform_floor_secs: MIN_PLATFORM_INTERVAL_SECS,
        }
    }
}

/// Notification payload and fallback texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Channel id attached to every request (used by Android).
    pub channel_id: String,
    /// Deep link opened when a reminder is tapped.
    pub deep_link: String,
    /// Title of the background fallback notification.
    pub fallback_title: String,
    /// Body used when no task snapshot could be read.
    pub fallback_body: String,
    /// Body used when the snapshot has no pending tasks.
    pub fallback_idle_body: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel_id: "reminders".to_owned(),
            deep_link: "hive://(tabs)".to_owned(),
            fallback_title: "Hive reminder".to_owned(),
            fallback_body: "Remember your tasks for today.".to_owned(),
            fallback_idle_body: "No overdue tasks. Open the app to check.".to_owned(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| HiveError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise return defaults.
    ///
    /// A file that exists but cannot be parsed is logged and ignored.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("ignoring invalid config at {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| HiveError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        crate::hive_dirs::config_file()
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`HiveError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let hours = [
            ("schedule.day_before_hour", self.schedule.day_before_hour),
            ("schedule.morning_hour", self.schedule.morning_hour),
            ("schedule.evening_hour", self.schedule.evening_hour),
            ("schedule.overdue_hour", self.schedule.overdue_hour),
        ];
        for (name, hour) in hours {
            if hour > 23 {
                return Err(HiveError::Config(format!("{name} must be 0-23, got {hour}")));
            }
        }
        if self.background.platform_floor_secs < MIN_PLATFORM_INTERVAL_SECS {
            return Err(HiveError::Config(format!(
                "background.platform_floor_secs must be at least {MIN_PLATFORM_INTERVAL_SECS}, got {}",
                self.background.platform_floor_secs
            )));
        }
        if self.background.task_name.trim().is_empty() {
            return Err(HiveError::Config(
                "background.task_name must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}
