//! Reminder preferences and their durable store.
//!
//! Preferences are normalized on every read: a missing or unreadable slot
//! yields the defaults, and an out-of-range cadence is clamped into
//! `[CADENCE_FLOOR_MINUTES, CADENCE_CEILING_MINUTES]`.

use crate::error::Result;
use crate::state::{self, SLOT_PREFERENCES, StateStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Smallest cadence accepted, matching the OS background-fetch floor.
pub const CADENCE_FLOOR_MINUTES: u32 = 15;
/// Largest cadence accepted.
pub const CADENCE_CEILING_MINUTES: u32 = 240;
/// Cadence used when nothing valid is stored.
pub const DEFAULT_CADENCE_MINUTES: u32 = 15;
/// Cadences offered by the settings screen.
pub const CADENCE_CHOICES: [u32; 3] = [15, 30, 60];

/// Which notifications the user receives.
///
/// Daily summaries were retired; per-task reminders are the only mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationMode {
    #[default]
    #[serde(rename = "per-task")]
    PerTask,
}

/// Normalized user reminder preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Master switch for reminders and the background trigger.
    pub enabled: bool,
    /// Desired minutes between background re-evaluations.
    #[serde(rename = "frequencyMinutes")]
    pub cadence_minutes: u32,
    /// Notification mode; always [`NotificationMode::PerTask`].
    pub mode: NotificationMode,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            enabled: true,
            cadence_minutes: DEFAULT_CADENCE_MINUTES,
            mode: NotificationMode::PerTask,
        }
    }
}

impl Preferences {
    /// Cadence converted to seconds.
    pub fn cadence_secs(&self) -> u64 {
        u64::from(self.cadence_minutes) * 60
    }

    /// Normalize a raw stored document, field by field.
    ///
    /// Unknown or mistyped fields fall back to their defaults instead of
    /// rejecting the whole document.
    fn from_stored(raw: &serde_json::Value) -> Self {
        let defaults = Self::default();
        let enabled = raw
            .get("enabled")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(defaults.enabled);
        let cadence = raw
            .get("frequencyMinutes")
            .or_else(|| raw.get("cadenceMinutes"))
            .and_then(cadence_from_value)
            .map_or(defaults.cadence_minutes, clamp_cadence);
        Self {
            enabled,
            cadence_minutes: cadence,
            mode: NotificationMode::PerTask,
        }
    }
}

/// Partial update applied by [`SettingsStore::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreferencesPatch {
    /// New master switch value.
    pub enabled: Option<bool>,
    /// New cadence in minutes; clamped before it is stored.
    pub cadence_minutes: Option<i64>,
}

impl PreferencesPatch {
    /// Patch that only toggles the master switch.
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    /// Patch that only changes the cadence.
    pub fn cadence(minutes: i64) -> Self {
        Self {
            cadence_minutes: Some(minutes),
            ..Self::default()
        }
    }
}

/// Clamp any integer cadence into the accepted range.
pub fn clamp_cadence(minutes: i64) -> u32 {
    let clamped = minutes.clamp(
        i64::from(CADENCE_FLOOR_MINUTES),
        i64::from(CADENCE_CEILING_MINUTES),
    );
    u32::try_from(clamped).unwrap_or(DEFAULT_CADENCE_MINUTES)
}

/// Numeric cadence from a stored value: numbers and numeric strings count,
/// zero and non-finite values count as missing.
fn cadence_from_value(value: &serde_json::Value) -> Option<i64> {
    let minutes = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !minutes.is_finite() || minutes == 0.0 {
        return None;
    }
    // Saturating float-to-int cast; the caller clamps the result anyway.
    let rounded = minutes.round() as i64;
    Some(rounded)
}

/// Durable, normalizing store for [`Preferences`].
///
/// Writes come from a single UI flow, so last write wins.
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn StateStore>,
}

impl SettingsStore {
    /// Store preferences in `store`'s preferences slot.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Current preferences. Never fails: any read or parse error yields the
    /// defaults.
    pub async fn get(&self) -> Preferences {
        match state::read_json::<serde_json::Value>(self.store.as_ref(), SLOT_PREFERENCES).await {
            Ok(Some(raw)) => Preferences::from_stored(&raw),
            Ok(None) => {
                debug!("no stored reminder preferences, using defaults");
                Preferences::default()
            }
            Err(e) => {
                warn!("cannot load reminder preferences, using defaults: {e}");
                Preferences::default()
            }
        }
    }

    /// Merge `patch` into the current preferences, persist, and return the
    /// normalized result.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HiveError::Persistence`] if the write fails. The
    /// previous value stays in effect in that case.
    pub async fn update(&self, patch: PreferencesPatch) -> Result<Preferences> {
        let mut next = self.get().await;
        if let Some(enabled) = patch.enabled {
            next.enabled = enabled;
        }
        if let Some(minutes) = patch.cadence_minutes {
            next.cadence_minutes = clamp_cadence(minutes);
        }
        state::write_json(self.store.as_ref(), SLOT_PREFERENCES, &next).await?;
        debug!(
            enabled = next.enabled,
            cadence_minutes = next.cadence_minutes,
            "reminder preferences updated"
        );
        Ok(next)
    }

    /// Write the defaults back.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HiveError::Persistence`] if the write fails.
    pub async fn reset(&self) -> Result<Preferences> {
        let defaults = Preferences::default();
        state::write_json(self.store.as_ref(), SLOT_PREFERENCES, &defaults).await?;
        Ok(defaults)
    }
}
