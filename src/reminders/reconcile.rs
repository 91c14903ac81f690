//! Reminder reconciliation.
//!
//! Replaces every reminder this engine scheduled with a freshly planned
//! set. The persisted [`HandleLedger`] is the engine's only record of live
//! platform timers, and after every pass it holds exactly the handles that
//! pass scheduled. Passes never edit the ledger partially: they cancel
//! everything it lists, schedule the new set, then write it back whole.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::NotificationConfig;
use crate::error::Result;
use crate::platform::{NotificationScheduler, PermissionStatus, ScheduledHandle};
use crate::reminders::plan::ReminderSpec;
use crate::state::{self, SLOT_SUMMARY_HANDLES, SLOT_TASK_HANDLES, StateStore};

/// Persisted set of scheduled handles under one fixed slot.
#[derive(Clone)]
pub struct HandleLedger {
    store: Arc<dyn StateStore>,
    slot: &'static str,
}

impl HandleLedger {
    /// Ledger stored under `slot`.
    pub fn new(store: Arc<dyn StateStore>, slot: &'static str) -> Self {
        Self { store, slot }
    }

    /// Ledger of task reminder handles.
    pub fn task_reminders(store: Arc<dyn StateStore>) -> Self {
        Self::new(store, SLOT_TASK_HANDLES)
    }

    /// Ledger left behind by the retired daily summaries.
    pub fn legacy_summaries(store: Arc<dyn StateStore>) -> Self {
        Self::new(store, SLOT_SUMMARY_HANDLES)
    }

    /// Slot name.
    pub fn slot(&self) -> &'static str {
        self.slot
    }

    /// Handles recorded by the previous pass. Unreadable ledgers count as empty.
    pub async fn load(&self) -> Vec<ScheduledHandle> {
        match state::read_json::<Vec<ScheduledHandle>>(self.store.as_ref(), self.slot).await {
            Ok(handles) => handles.unwrap_or_default(),
            Err(e) => {
                warn!(slot = self.slot, "cannot read handle ledger, treating as empty: {e}");
                Vec::new()
            }
        }
    }

    /// Replace the ledger with `handles` in a single write.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HiveError::Persistence`] if the write fails.
    pub async fn save(&self, handles: &[ScheduledHandle]) -> Result<()> {
        state::write_json(self.store.as_ref(), self.slot, handles).await
    }

    /// Delete the slot entirely.
    pub async fn remove(&self) -> Result<()> {
        self.store.remove(self.slot).await
    }
}

/// Whether a pass may prompt the user for notification permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionPolicy {
    /// Ask when the user has not decided yet (foreground passes).
    Prompt,
    /// Only read the current state (background passes).
    CheckOnly,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Handles from the previous pass that were cancelled.
    pub cancelled: usize,
    /// Cancellations that failed and were skipped.
    pub cancel_failures: usize,
    /// Handles scheduled by this pass, in submission order.
    pub scheduled: Vec<ScheduledHandle>,
    /// Specs whose submission failed and were skipped.
    pub schedule_failures: usize,
    /// Permission state observed by this pass.
    pub permission: PermissionStatus,
    /// Whether the new ledger was written.
    pub persisted: bool,
}

impl ReconcileReport {
    fn new(permission: PermissionStatus) -> Self {
        Self {
            cancelled: 0,
            cancel_failures: 0,
            scheduled: Vec::new(),
            schedule_failures: 0,
            permission,
            persisted: false,
        }
    }
}

/// Full-replace reconciler between planned reminders and the platform.
pub struct Reconciler {
    scheduler: Arc<dyn NotificationScheduler>,
    ledger: HandleLedger,
    legacy: HandleLedger,
    payload: NotificationConfig,
    pass: Mutex<()>,
}

impl Reconciler {
    /// Reconciler recording handles in `store`.
    pub fn new(
        scheduler: Arc<dyn NotificationScheduler>,
        store: Arc<dyn StateStore>,
        payload: NotificationConfig,
    ) -> Self {
        Self {
            scheduler,
            ledger: HandleLedger::task_reminders(Arc::clone(&store)),
            legacy: HandleLedger::legacy_summaries(store),
            payload,
            pass: Mutex::new(()),
        }
    }

    /// The task reminder ledger.
    pub fn ledger(&self) -> &HandleLedger {
        &self.ledger
    }

    /// Foreground pass: prompts for permission when undetermined.
    pub async fn reconcile(&self, specs: &[ReminderSpec]) -> ReconcileReport {
        self.reconcile_with(specs, PermissionPolicy::Prompt).await
    }

    /// Replace all previously scheduled reminders with `specs`.
    ///
    /// Never fails. Individual cancel or schedule failures are logged and
    /// skipped; without permission the ledger is cleared and nothing is
    /// scheduled.
    pub async fn reconcile_with(&self, specs: &[ReminderSpec], policy: PermissionPolicy) -> ReconcileReport {
        let _pass = self.pass.lock().await;

        let (cancelled, cancel_failures) = self.cancel_ledger(&self.ledger).await;

        let permission = self.resolve_permission(policy).await;
        let mut report = ReconcileReport::new(permission);
        report.cancelled = cancelled;
        report.cancel_failures = cancel_failures;

        if !permission.is_granted() {
            info!(?permission, "notification permission not granted, reminders cleared");
            report.persisted = self.persist(&self.ledger, &[]).await;
            return report;
        }

        for spec in specs {
            let request = spec.to_request(&self.payload);
            match self.scheduler.schedule(&request).await {
                Ok(handle) => {
                    debug!(%handle, trigger = %request.trigger, "reminder scheduled");
                    report.scheduled.push(handle);
                }
                Err(e) => {
                    warn!(
                        correlation_id = ?spec.correlation_id,
                        trigger = %request.trigger,
                        "cannot schedule reminder, skipping: {e}"
                    );
                    report.schedule_failures += 1;
                }
            }
        }

        report.persisted = self.persist(&self.ledger, &report.scheduled).await;
        info!(
            cancelled = report.cancelled,
            scheduled = report.scheduled.len(),
            failed = report.schedule_failures,
            "reminders reconciled"
        );
        report
    }

    /// Cancel every recorded reminder and clear the ledger.
    ///
    /// Needs no permission, so it also works after the user revoked it.
    pub async fn clear(&self) -> ReconcileReport {
        let _pass = self.pass.lock().await;
        let (cancelled, cancel_failures) = self.cancel_ledger(&self.ledger).await;
        let permission = self
            .scheduler
            .permission_status()
            .await
            .unwrap_or(PermissionStatus::Undetermined);
        let mut report = ReconcileReport::new(permission);
        report.cancelled = cancelled;
        report.cancel_failures = cancel_failures;
        report.persisted = self.persist(&self.ledger, &[]).await;
        debug!(cancelled, "reminders cleared");
        report
    }

    /// Cancel and forget any handles left under the retired daily-summary slot.
    ///
    /// Returns the number of handles cancelled.
    pub async fn purge_legacy_summaries(&self) -> usize {
        let (cancelled, _) = self.cancel_ledger(&self.legacy).await;
        if cancelled > 0 {
            info!(cancelled, "cancelled legacy daily summary notifications");
        }
        if let Err(e) = self.legacy.remove().await {
            warn!("cannot remove legacy summary ledger: {e}");
        }
        cancelled
    }

    /// Cancel every handle in `ledger`. Returns `(cancelled, failed)`.
    async fn cancel_ledger(&self, ledger: &HandleLedger) -> (usize, usize) {
        let previous = ledger.load().await;
        let mut cancelled = 0;
        let mut failed = 0;
        for handle in &previous {
            match self.scheduler.cancel(handle).await {
                Ok(()) => cancelled += 1,
                Err(e) => {
                    warn!(%handle, slot = ledger.slot(), "cannot cancel notification, skipping: {e}");
                    failed += 1;
                }
            }
        }
        (cancelled, failed)
    }

    async fn resolve_permission(&self, policy: PermissionPolicy) -> PermissionStatus {
        let status = match self.scheduler.permission_status().await {
            Ok(status) => status,
            Err(e) => {
                warn!("cannot query notification permission, treating as denied: {e}");
                return PermissionStatus::Denied;
            }
        };
        if status != PermissionStatus::Undetermined || policy == PermissionPolicy::CheckOnly {
            return status;
        }
        match self.scheduler.request_permission().await {
            Ok(status) => status,
            Err(e) => {
                warn!("notification permission request failed: {e}");
                PermissionStatus::Denied
            }
        }
    }

    async fn persist(&self, ledger: &HandleLedger, handles: &[ScheduledHandle]) -> bool {
        match ledger.save(handles).await {
            Ok(()) => true,
            Err(e) => {
                warn!(slot = ledger.slot(), count = handles.len(), "cannot persist handle ledger: {e}");
                false
            }
        }
    }
}
