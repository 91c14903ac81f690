//! Hive: reminder scheduling engine for a household chore tracker.
//!
//! Keeps the device's local notifications and a periodic background
//! trigger consistent with the user's task list and reminder preferences.
//!
//! # Architecture
//!
//! - **Settings**: durable, self-normalizing reminder preferences
//! - **Planner**: pure mapping from tasks and "now" to desired reminders
//! - **Reconciler**: full-replace sync of desired reminders with the
//!   platform's pending notifications, tracked in a persisted ledger
//! - **Cadence manager**: keeps the OS background trigger registered at the
//!   preferred interval
//! - **Engine**: the single entry point every mutation path calls, plus the
//!   background trigger handler
//!
//! Platform facilities are consumed through the traits in [`platform`].

pub mod background;
pub mod config;
pub mod engine;
pub mod error;
pub mod hive_dirs;
pub mod platform;
pub mod reminders;
pub mod settings;
pub mod state;
pub mod tasks;

pub use background::{BackgroundFetchResult, CadenceManager, CadenceState};
pub use config::EngineConfig;
pub use engine::{ApplyReport, Clock, FixedClock, ReminderEngine, SystemClock};
pub use error::{HiveError, Result};
pub use reminders::{Planner, Reconciler, ReminderSpec};
pub use settings::{Preferences, PreferencesPatch, SettingsStore};
pub use tasks::{Task, TaskId, TaskSource};
