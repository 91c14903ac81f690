//! Task reminders: planning the desired set and reconciling it with the
//! platform's pending notifications.

pub mod plan;
pub mod reconcile;

pub use plan::{DueCategory, FireAt, Planner, ReminderSpec};
pub use reconcile::{HandleLedger, PermissionPolicy, ReconcileReport, Reconciler};
