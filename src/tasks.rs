//! Task snapshot types consumed by the reminder engine.
//!
//! Tasks are owned by the external task store; the engine only reads them.
//! Decoding is lenient so that a cached snapshot written by older app
//! versions (French field names, RFC 3339 due dates, numeric ids) still
//! loads.

use crate::error::Result;
use crate::state::{self, SLOT_TASKS, StateStore};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque task identifier as issued by the backend or the local id counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Number(i64),
    Text(String),
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for TaskId {
    fn from(value: i32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// Read-only view of a household task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Backend or local id; absent for tasks that were never saved.
    #[serde(default)]
    pub id: Option<TaskId>,
    /// Display title.
    #[serde(default, alias = "titre", deserialize_with = "null_as_default")]
    pub title: String,
    /// Due date, normally `YYYY-MM-DD`.
    #[serde(
        default,
        rename = "dueDate",
        alias = "due_date",
        deserialize_with = "string_or_none"
    )]
    pub due_date: Option<String>,
    /// Whether the task has been marked done.
    #[serde(default, alias = "done", deserialize_with = "null_as_default")]
    pub completed: bool,
}

impl Task {
    /// Build a task due on `due`.
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>, due: NaiveDate) -> Self {
        Self {
            id: Some(id.into()),
            title: title.into(),
            due_date: Some(due.format("%Y-%m-%d").to_string()),
            completed: false,
        }
    }

    /// Calendar due date, interpreted in the timezone of `reference`.
    ///
    /// A plain `YYYY-MM-DD` date is taken literally. A timestamp is first
    /// converted into the reference timezone. Anything else yields `None`,
    /// exactly like a task without a due date.
    pub fn due_day<Tz: TimeZone>(&self, reference: &DateTime<Tz>) -> Option<NaiveDate> {
        let raw = self.due_date.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(date);
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&reference.timezone()).date_naive());
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|dt| dt.date())
    }

    /// Title to show in notifications, with a placeholder for blank titles.
    pub fn display_title(&self) -> &str {
        let trimmed = self.title.trim();
        if trimmed.is_empty() { "A task" } else { trimmed }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

/// Read-only access to the best available task snapshot.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Current task list. Order is preserved by the planner.
    async fn snapshot(&self) -> Result<Vec<Task>>;
}

/// Task source backed by the locally cached snapshot slot.
///
/// Available to both foreground and background contexts since it needs no
/// network access.
#[derive(Clone)]
pub struct CachedTaskSource {
    store: Arc<dyn StateStore>,
}

impl CachedTaskSource {
    /// Read tasks from `store`'s task slot.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Replace the cached snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HiveError::Persistence`] if the write fails.
    pub async fn store_snapshot(&self, tasks: &[Task]) -> Result<()> {
        state::write_json(self.store.as_ref(), SLOT_TASKS, tasks).await
    }
}

#[async_trait]
impl TaskSource for CachedTaskSource {
    async fn snapshot(&self) -> Result<Vec<Task>> {
        Ok(state::read_json(self.store.as_ref(), SLOT_TASKS)
            .await?
            .unwrap_or_default())
    }
}
