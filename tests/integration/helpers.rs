//! Shared helpers for integration tests.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, TimeZone};
use hive::platform::memory::{InMemoryNotificationScheduler, InMemoryRegistrar};
use hive::state::{MemoryStateStore, StateStore};
use hive::{EngineConfig, FixedClock, ReminderEngine, Task};

/// Engine wired to in-memory adapters, with handles on each adapter.
pub(crate) struct TestEngine {
    pub store: Arc<MemoryStateStore>,
    pub scheduler: Arc<InMemoryNotificationScheduler>,
    pub registrar: Arc<InMemoryRegistrar>,
    pub engine: ReminderEngine,
}

/// Engine with default config, granted permission and a clock frozen at `now`.
pub(crate) fn test_engine(now: DateTime<Local>) -> TestEngine {
    let store = Arc::new(MemoryStateStore::new());
    let scheduler = Arc::new(InMemoryNotificationScheduler::new());
    let registrar = Arc::new(InMemoryRegistrar::new());
    let engine = engine_on(store.clone(), scheduler.clone(), registrar.clone(), now);
    TestEngine {
        store,
        scheduler,
        registrar,
        engine,
    }
}

/// Engine over existing adapters.
pub(crate) fn engine_on(
    store: Arc<dyn StateStore>,
    scheduler: Arc<InMemoryNotificationScheduler>,
    registrar: Arc<InMemoryRegistrar>,
    now: DateTime<Local>,
) -> ReminderEngine {
    ReminderEngine::new(EngineConfig::default(), store, scheduler, registrar)
        .with_clock(Arc::new(FixedClock(now)))
}

/// Local wall-clock instant on 2025-09-10.
pub(crate) fn local_on_sept_10(hour: u32, minute: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2025, 9, 10, hour, minute, 0)
        .single()
        .expect("unambiguous local time")
}

/// Fixed-offset instant parsed from RFC 3339.
pub(crate) fn instant(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).expect("valid RFC 3339")
}

/// Task `days` calendar days after `today`.
pub(crate) fn task_in(id: i64, title: &str, today: NaiveDate, days: i64) -> Task {
    Task::new(id, title, today + Duration::days(days))
}

pub(crate) fn sept(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, day).expect("valid date")
}
