//! Reminder engine: the single entry point that keeps scheduled reminders
//! and the background trigger consistent with preferences and tasks.
//!
//! Every mutation path in the host app (task created, updated, completed,
//! settings changed, cold start) calls [`ReminderEngine::apply_all`]. Nothing
//! else schedules task reminders. The OS background trigger calls
//! [`ReminderEngine::run_background_refresh`], which re-reads all state at
//! invocation time.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Local};
use futures_util::FutureExt;
use tracing::{debug, error, info, warn};

use crate::background::{BackgroundFetchResult, CadenceManager, CadenceState, fallback_request};
use crate::config::EngineConfig;
use crate::error::{HiveError, Result};
use crate::platform::{
    BackgroundRegistrar, NotificationRequest, NotificationScheduler, NotificationTrigger,
    PermissionStatus, ScheduledHandle,
};
use crate::reminders::{PermissionPolicy, Planner, ReconcileReport, Reconciler, ReminderSpec};
use crate::settings::{Preferences, PreferencesPatch, SettingsStore};
use crate::state::StateStore;
use crate::tasks::{CachedTaskSource, Task, TaskSource};

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// Outcome of one [`ReminderEngine::apply_all`] pass.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    /// Preferences the pass acted on.
    pub preferences: Preferences,
    /// Reminders planned (zero when disabled).
    pub planned: usize,
    /// Reconciliation outcome.
    pub reminders: ReconcileReport,
    /// Legacy summary notifications cancelled.
    pub legacy_cancelled: usize,
    /// Background trigger state, if the cadence update succeeded.
    pub cadence: Option<CadenceState>,
    /// Why the cadence update failed.
    pub cadence_error: Option<String>,
}

/// Orchestrates settings, planning, reconciliation and background cadence.
pub struct ReminderEngine {
    config: EngineConfig,
    settings: SettingsStore,
    planner: Planner,
    reconciler: Reconciler,
    cadence: CadenceManager,
    scheduler: Arc<dyn NotificationScheduler>,
    tasks: Arc<dyn TaskSource>,
    clock: Arc<dyn Clock>,
}

impl ReminderEngine {
    /// Engine reading tasks from the cached snapshot in `store`.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn StateStore>,
        scheduler: Arc<dyn NotificationScheduler>,
        registrar: Arc<dyn BackgroundRegistrar>,
    ) -> Self {
        Self {
            settings: SettingsStore::new(Arc::clone(&store)),
            planner: Planner::new(config.schedule.clone()),
            reconciler: Reconciler::new(
                Arc::clone(&scheduler),
                Arc::clone(&store),
                config.notifications.clone(),
            ),
            cadence: CadenceManager::new(registrar, &config.background),
            scheduler,
            tasks: Arc::new(CachedTaskSource::new(store)),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Read tasks from `source` instead of the cached snapshot.
    pub fn with_task_source(mut self, source: Arc<dyn TaskSource>) -> Self {
        self.tasks = source;
        self
    }

    /// Use `clock` instead of the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn cadence(&self) -> &CadenceManager {
        &self.cadence
    }

    /// Bring reminders and the background trigger in line with current
    /// preferences and `tasks` (or the task snapshot when `None`).
    ///
    /// Never fails; every failure degrades to fewer reminders and is
    /// reflected in the report.
    pub async fn apply_all(&self, tasks: Option<&[Task]>) -> ApplyReport {
        let prefs = self.settings.get().await;

        if !prefs.enabled {
            let reminders = self.reconciler.clear().await;
            let legacy_cancelled = self.reconciler.purge_legacy_summaries().await;
            let (cadence, cadence_error) = self.apply_cadence(&prefs).await;
            info!(cancelled = reminders.cancelled, "reminders disabled, everything cleared");
            return ApplyReport {
                preferences: prefs,
                planned: 0,
                reminders,
                legacy_cancelled,
                cadence,
                cadence_error,
            };
        }

        let legacy_cancelled = self.reconciler.purge_legacy_summaries().await;
        let tasks = self.load_tasks(tasks).await;
        let specs = self.planner.plan(&tasks, &self.clock.now());
        debug!(tasks = tasks.len(), specs = specs.len(), "reminders planned");
        let reminders = self.reconciler.reconcile(&specs).await;
        let (cadence, cadence_error) = self.apply_cadence(&prefs).await;

        ApplyReport {
            preferences: prefs,
            planned: specs.len(),
            reminders,
            legacy_cancelled,
            cadence,
            cadence_error,
        }
    }

    /// Persist a preference change, then re-apply everything.
    ///
    /// # Errors
    ///
    /// Returns [`HiveError::Persistence`] if the preferences cannot be saved;
    /// nothing is re-applied in that case.
    pub async fn update_preferences(&self, patch: PreferencesPatch) -> Result<ApplyReport> {
        self.settings.update(patch).await?;
        Ok(self.apply_all(None).await)
    }

    /// Restore default preferences, then re-apply everything.
    ///
    /// # Errors
    ///
    /// Returns [`HiveError::Persistence`] if the defaults cannot be saved.
    pub async fn reset_preferences(&self) -> Result<ApplyReport> {
        self.settings.reset().await?;
        Ok(self.apply_all(None).await)
    }

    /// Reminders that `apply_all` would schedule right now. Schedules nothing.
    pub async fn preview(&self, tasks: Option<&[Task]>) -> Vec<ReminderSpec> {
        let tasks = self.load_tasks(tasks).await;
        self.planner.plan(&tasks, &self.clock.now())
    }

    /// Handler for the OS background trigger.
    ///
    /// Never panics and never returns an error: anything unexpected is
    /// reported as [`BackgroundFetchResult::Failed`].
    pub async fn run_background_refresh(&self) -> BackgroundFetchResult {
        match AssertUnwindSafe(self.background_refresh()).catch_unwind().await {
            Ok(Ok(result)) => {
                info!(%result, "background refresh finished");
                result
            }
            Ok(Err(e)) => {
                error!("background refresh failed: {e}");
                BackgroundFetchResult::Failed
            }
            Err(_) => {
                error!("background refresh panicked");
                BackgroundFetchResult::Failed
            }
        }
    }

    async fn background_refresh(&self) -> Result<BackgroundFetchResult> {
        let prefs = self.settings.get().await;
        if !prefs.enabled {
            // The trigger can fire after the user disabled reminders but
            // before it was unregistered.
            self.reconciler.clear().await;
            debug!("reminders disabled, background refresh skipped");
            return Ok(BackgroundFetchResult::NoData);
        }

        let permission = self
            .scheduler
            .permission_status()
            .await
            .map_err(|e| HiveError::Scheduling(format!("permission query failed: {e}")))?;
        if !permission.is_granted() {
            debug!(?permission, "no notification permission, background refresh skipped");
            return Ok(BackgroundFetchResult::NoData);
        }

        let now = self.clock.now();
        let snapshot = match self.tasks.snapshot().await {
            Ok(tasks) => Some(tasks),
            Err(e) => {
                warn!("cannot read task snapshot in background: {e}");
                None
            }
        };
        let specs = self
            .planner
            .plan(snapshot.as_deref().unwrap_or_default(), &now);
        let report = self
            .reconciler
            .reconcile_with(&specs, PermissionPolicy::CheckOnly)
            .await;

        if report.scheduled.is_empty() {
            let request = fallback_request(snapshot.as_deref(), &now, &self.config.notifications);
            self.scheduler
                .schedule(&request)
                .await
                .map_err(|e| HiveError::Scheduling(format!("fallback notification: {e}")))?;
            debug!(body = %request.body, "fallback notification sent");
        }
        Ok(BackgroundFetchResult::NewData)
    }

    /// Schedule `count` throwaway notifications, `spacing_secs` apart.
    ///
    /// The notifications are not recorded in the handle ledger, so the next
    /// reconciliation leaves them alone.
    ///
    /// # Errors
    ///
    /// - [`HiveError::PermissionDenied`] without notification permission.
    /// - [`HiveError::Scheduling`] if the last delay overflows or any
    ///   submission fails. Nothing is scheduled when the delay overflows.
    pub async fn send_test_burst(&self, count: u32, spacing_secs: u64) -> Result<Vec<ScheduledHandle>> {
        if u64::from(count).checked_mul(spacing_secs).is_none() {
            return Err(HiveError::Scheduling(format!(
                "{count} test notifications {spacing_secs}s apart overflow the delay"
            )));
        }
        let status = match self.scheduler.permission_status().await {
            Ok(PermissionStatus::Undetermined) => self.scheduler.request_permission().await,
            other => other,
        }
        .map_err(|e| HiveError::Scheduling(e.to_string()))?;
        if !status.is_granted() {
            return Err(HiveError::PermissionDenied);
        }

        let payload = &self.config.notifications;
        let mut handles = Vec::with_capacity(count as usize);
        for i in 1..=count {
            let request = NotificationRequest {
                deep_link: Some(payload.deep_link.clone()),
                channel_id: Some(payload.channel_id.clone()),
                ..NotificationRequest::new(
                    "Test reminder",
                    format!("Test notification {i} of {count}"),
                    NotificationTrigger::After {
                        secs: u64::from(i).saturating_mul(spacing_secs),
                    },
                )
            };
            let handle = self
                .scheduler
                .schedule(&request)
                .await
                .map_err(|e| HiveError::Scheduling(e.to_string()))?;
            handles.push(handle);
        }
        info!(count, spacing_secs, "test notifications scheduled");
        Ok(handles)
    }

    async fn load_tasks(&self, given: Option<&[Task]>) -> Vec<Task> {
        if let Some(tasks) = given {
            return tasks.to_vec();
        }
        self.tasks.snapshot().await.unwrap_or_else(|e| {
            warn!("cannot read task snapshot, planning no reminders: {e}");
            Vec::new()
        })
    }

    async fn apply_cadence(&self, prefs: &Preferences) -> (Option<CadenceState>, Option<String>) {
        match self.cadence.apply(prefs).await {
            Ok(state) => (Some(state), None),
            Err(e) => {
                warn!("cannot update background trigger: {e}");
                (None, Some(e.to_string()))
            }
        }
    }
}
