//! Background trigger management.
//!
//! [`CadenceManager`] keeps the OS periodic trigger in step with the user's
//! preferences. Every transition first asks the registrar what is already
//! registered, so repeated calls (every app launch, every settings change)
//! never stack duplicate triggers.
//!
//! The trigger handler itself lives on [`crate::engine::ReminderEngine`];
//! this module provides the result codes and the fallback notification it
//! sends when a refresh yields nothing to schedule.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{BackgroundConfig, NotificationConfig};
use crate::error::{HiveError, Result};
use crate::platform::{
    BackgroundRegistrar, BackgroundStatus, NotificationRequest, NotificationTrigger, PlatformError,
};
use crate::settings::Preferences;
use crate::tasks::Task;

/// Registration state of the periodic trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CadenceState {
    Registered { interval_secs: u64 },
    Unregistered,
}

impl fmt::Display for CadenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered { interval_secs } => write!(f, "registered every {interval_secs}s"),
            Self::Unregistered => f.write_str("unregistered"),
        }
    }
}

/// Result reported to the platform after a background refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundFetchResult {
    NewData,
    NoData,
    Failed,
}

impl fmt::Display for BackgroundFetchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NewData => "new-data",
            Self::NoData => "no-data",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Maps preferences onto background trigger registration.
pub struct CadenceManager {
    registrar: Arc<dyn BackgroundRegistrar>,
    task_name: String,
    floor_secs: u64,
}

impl CadenceManager {
    pub fn new(registrar: Arc<dyn BackgroundRegistrar>, config: &BackgroundConfig) -> Self {
        Self {
            registrar,
            task_name: config.task_name.clone(),
            floor_secs: config.platform_floor_secs,
        }
    }

    /// Name the trigger is registered under.
    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Trigger interval for `prefs`, never below the platform floor.
    pub fn interval_for(&self, prefs: &Preferences) -> u64 {
        prefs.cadence_secs().max(self.floor_secs)
    }

    /// Bring the trigger registration in line with `prefs`.
    ///
    /// # Errors
    ///
    /// - [`HiveError::RegistrationRestricted`] if the OS does not allow
    ///   background execution.
    /// - [`HiveError::Registration`] if a registrar call fails.
    pub async fn apply(&self, prefs: &Preferences) -> Result<CadenceState> {
        if !prefs.enabled {
            self.unregister().await?;
            return Ok(CadenceState::Unregistered);
        }

        let interval_secs = self.interval_for(prefs);
        let status = self.registrar.status().await.map_err(registration)?;
        if status != BackgroundStatus::Available {
            warn!(?status, task = %self.task_name, "background execution unavailable");
            return Err(HiveError::RegistrationRestricted(format!(
                "background execution is {status:?}"
            )));
        }

        let registered = self
            .registrar
            .is_registered(&self.task_name)
            .await
            .map_err(registration)?;
        if !registered {
            self.registrar
                .register(&self.task_name, interval_secs)
                .await
                .map_err(registration)?;
            info!(task = %self.task_name, interval_secs, "background trigger registered");
            return Ok(CadenceState::Registered { interval_secs });
        }

        let current = self
            .registrar
            .registered_interval(&self.task_name)
            .await
            .unwrap_or_else(|e| {
                debug!("cannot read registered interval, updating anyway: {e}");
                None
            });
        if current == Some(interval_secs) {
            debug!(task = %self.task_name, interval_secs, "background trigger already up to date");
            return Ok(CadenceState::Registered { interval_secs });
        }

        match self
            .registrar
            .set_min_interval(&self.task_name, interval_secs)
            .await
        {
            Ok(()) => {
                info!(task = %self.task_name, interval_secs, "background interval updated");
            }
            Err(PlatformError::Unsupported) => {
                debug!(task = %self.task_name, "no in-place interval update, re-registering");
                self.registrar
                    .unregister(&self.task_name)
                    .await
                    .map_err(registration)?;
                self.registrar
                    .register(&self.task_name, interval_secs)
                    .await
                    .map_err(registration)?;
                info!(task = %self.task_name, interval_secs, "background trigger re-registered");
            }
            Err(e) => return Err(registration(e)),
        }
        Ok(CadenceState::Registered { interval_secs })
    }

    /// Remove the trigger if it is registered.
    ///
    /// # Errors
    ///
    /// Returns [`HiveError::Registration`] if a registrar call fails.
    pub async fn unregister(&self) -> Result<()> {
        let registered = self
            .registrar
            .is_registered(&self.task_name)
            .await
            .map_err(registration)?;
        if registered {
            self.registrar
                .unregister(&self.task_name)
                .await
                .map_err(registration)?;
            info!(task = %self.task_name, "background trigger unregistered");
        }
        Ok(())
    }
}

fn registration(e: PlatformError) -> HiveError {
    HiveError::Registration(e.to_string())
}

/// Body of the fallback notification.
///
/// Summarises pending tasks as `"N to do. Next: <title>"`, where the next
/// task is the pending one with the earliest due date. `None` means the
/// snapshot could not be read. With nothing pending the configured idle
/// body is used.
pub fn fallback_body<Tz: TimeZone>(
    tasks: Option<&[Task]>,
    now: &DateTime<Tz>,
    config: &NotificationConfig,
) -> String {
    let Some(tasks) = tasks else {
        return config.fallback_body.clone();
    };
    let pending: Vec<&Task> = tasks.iter().filter(|t| !t.completed).collect();
    // Undated tasks sort after dated ones; ties keep snapshot order.
    let next = pending
        .iter()
        .min_by_key(|t| t.due_day(now).map_or((1, None), |d| (0, Some(d))));
    match next {
        Some(task) => format!("{} to do. Next: {}", pending.len(), task.display_title()),
        None => config.fallback_idle_body.clone(),
    }
}

/// Immediate fallback notification for a refresh that scheduled nothing.
pub fn fallback_request<Tz: TimeZone>(
    tasks: Option<&[Task]>,
    now: &DateTime<Tz>,
    config: &NotificationConfig,
) -> NotificationRequest {
    NotificationRequest {
        deep_link: Some(config.deep_link.clone()),
        channel_id: Some(config.channel_id.clone()),
        ..NotificationRequest::new(
            config.fallback_title.clone(),
            fallback_body(tasks, now, config),
            NotificationTrigger::Immediate,
        )
    }
}
