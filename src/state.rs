//! Durable key/value slots.
//!
//! The engine owns a handful of fixed slots, each holding one JSON document
//! that is always replaced as a whole. [`FileStateStore`] keeps one file per
//! slot; [`MemoryStateStore`] is used by tests and dry runs.

use crate::error::{HiveError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Slot holding the user's reminder preferences.
pub const SLOT_PREFERENCES: &str = "notificationSettings";
/// Slot holding the handles of the currently scheduled task reminders.
pub const SLOT_TASK_HANDLES: &str = "taskReminderIds";
/// Slot holding handles left behind by the retired daily summaries.
pub const SLOT_SUMMARY_HANDLES: &str = "summaryReminderIds";
/// Slot holding the locally cached task snapshot.
pub const SLOT_TASKS: &str = "tasks";

/// Every slot the engine reads or writes.
pub const ALL_SLOTS: [&str; 4] = [SLOT_PREFERENCES, SLOT_TASK_HANDLES, SLOT_SUMMARY_HANDLES, SLOT_TASKS];

/// Whole-value storage keyed by slot name.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a slot. Returns `Ok(None)` when the slot was never written.
    async fn read(&self, slot: &str) -> Result<Option<String>>;

    /// Replace a slot's content in a single write.
    async fn write(&self, slot: &str, value: &str) -> Result<()>;

    /// Delete a slot. Removing a missing slot is not an error.
    async fn remove(&self, slot: &str) -> Result<()>;
}

/// Read and decode a JSON slot.
///
/// # Errors
///
/// Returns [`HiveError::Persistence`] if the slot cannot be read or decoded.
pub async fn read_json<T: DeserializeOwned>(store: &dyn StateStore, slot: &str) -> Result<Option<T>> {
    let Some(raw) = store.read(slot).await? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| HiveError::Persistence(format!("cannot parse slot '{slot}': {e}")))
}

/// Encode a value as JSON and replace the slot with it.
///
/// # Errors
///
/// Returns [`HiveError::Persistence`] if encoding or the write fails.
pub async fn write_json<T: Serialize + ?Sized>(store: &dyn StateStore, slot: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)
        .map_err(|e| HiveError::Persistence(format!("cannot serialize slot '{slot}': {e}")))?;
    store.write(slot, &json).await
}

/// File-backed store: one `<slot>.json` file per slot under a directory.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the default state directory.
    pub fn open_default() -> Self {
        Self::new(crate::hive_dirs::state_dir())
    }

    /// Directory holding the slot files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{slot}.json"))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn read(&self, slot: &str) -> Result<Option<String>> {
        let path = self.slot_path(slot);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HiveError::Persistence(format!(
                "cannot read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn write(&self, slot: &str, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            HiveError::Persistence(format!(
                "cannot create state directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let path = self.slot_path(slot);
        let tmp = self.dir.join(format!(".{slot}.json.tmp"));
        tokio::fs::write(&tmp, value).await.map_err(|e| {
            HiveError::Persistence(format!("cannot write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            HiveError::Persistence(format!("cannot replace {}: {e}", path.display()))
        })?;
        Ok(())
    }

    async fn remove(&self, slot: &str) -> Result<()> {
        let path = self.slot_path(slot);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HiveError::Persistence(format!(
                "cannot delete {}: {e}",
                path.display()
            ))),
        }
    }
}

/// In-memory store with optional failure injection.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    slots: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Detached copy of every engine slot in `source`.
    ///
    /// Writes to the copy never reach `source`, so a pass run against it
    /// leaves the real handle ledger untouched.
    ///
    /// # Errors
    ///
    /// Returns [`HiveError::Persistence`] if any slot of `source` cannot be read.
    pub async fn copy_of(source: &dyn StateStore) -> Result<Self> {
        let mut slots = HashMap::new();
        for slot in ALL_SLOTS {
            if let Some(value) = source.read(slot).await? {
                slots.insert(slot.to_owned(), value);
            }
        }
        let copy = Self::new();
        copy.lock()?.extend(slots);
        Ok(copy)
    }

    /// Make every subsequent read fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write and remove fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw slot content, bypassing failure injection.
    pub fn peek(&self, slot: &str) -> Option<String> {
        self.slots
            .lock()
            .ok()
            .and_then(|slots| slots.get(slot).cloned())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.slots
            .lock()
            .map_err(|_| HiveError::Persistence("state lock poisoned".to_owned()))
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn read(&self, slot: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(HiveError::Persistence(format!("injected read failure on '{slot}'")));
        }
        Ok(self.lock()?.get(slot).cloned())
    }

    async fn write(&self, slot: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(HiveError::Persistence(format!("injected write failure on '{slot}'")));
        }
        self.lock()?.insert(slot.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, slot: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(HiveError::Persistence(format!("injected write failure on '{slot}'")));
        }
        self.lock()?.remove(slot);
        Ok(())
    }
}
