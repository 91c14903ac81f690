//! Engine state persisted through the file-backed store.

use std::sync::Arc;

use hive::config::{EngineConfig, ScheduleConfig};
use hive::platform::memory::{InMemoryNotificationScheduler, InMemoryRegistrar};
use hive::state::{FileStateStore, MemoryStateStore, SLOT_PREFERENCES, SLOT_TASK_HANDLES};
use hive::{PreferencesPatch, SettingsStore};

use crate::helpers::{engine_on, local_on_sept_10, sept, task_in};

#[tokio::test]
async fn test_preferences_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    SettingsStore::new(Arc::new(FileStateStore::new(dir.path())))
        .update(PreferencesPatch::cadence(5))
        .await
        .unwrap();

    let raw = std::fs::read_to_string(dir.path().join(format!("{SLOT_PREFERENCES}.json"))).unwrap();
    assert!(raw.contains("\"frequencyMinutes\":15"), "{raw}");

    let prefs = SettingsStore::new(Arc::new(FileStateStore::new(dir.path())))
        .get()
        .await;
    assert_eq!(prefs.cadence_minutes, 15);
    assert!(prefs.enabled);
}

#[tokio::test]
async fn test_ledger_survives_restart_and_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let tasks = vec![task_in(1, "Trash", sept(10), 0)];

    let first_scheduler = Arc::new(InMemoryNotificationScheduler::new());
    let first = engine_on(
        Arc::new(FileStateStore::new(dir.path())),
        first_scheduler.clone(),
        Arc::new(InMemoryRegistrar::new()),
        local_on_sept_10(7, 0),
    );
    let report = first.apply_all(Some(tasks.as_slice())).await;
    assert_eq!(report.reminders.scheduled.len(), 2);

    // A new process sees the previous handles and cancels them.
    let second_scheduler = Arc::new(InMemoryNotificationScheduler::new());
    let second = engine_on(
        Arc::new(FileStateStore::new(dir.path())),
        second_scheduler.clone(),
        Arc::new(InMemoryRegistrar::new()),
        local_on_sept_10(7, 0),
    );
    let report = second.apply_all(Some(tasks.as_slice())).await;
    assert_eq!(report.reminders.cancelled, 2);
    assert_eq!(report.reminders.scheduled.len(), 2);

    let raw = std::fs::read_to_string(dir.path().join(format!("{SLOT_TASK_HANDLES}.json"))).unwrap();
    let stored: Vec<String> = serde_json::from_str(&raw).unwrap();
    let mut live: Vec<String> = second_scheduler
        .pending_handles()
        .into_iter()
        .map(|h| h.0)
        .collect();
    let mut stored_sorted = stored.clone();
    live.sort();
    stored_sorted.sort();
    assert_eq!(stored_sorted, live);
}

#[tokio::test]
async fn test_config_file_drives_fire_times() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[schedule]\nmorning_hour = 8\nevening_hour = 19\n").unwrap();

    let config = EngineConfig::from_file(&path).unwrap();
    assert_eq!(
        config.schedule,
        ScheduleConfig {
            morning_hour: 8,
            evening_hour: 19,
            ..ScheduleConfig::default()
        }
    );

    let engine = hive::ReminderEngine::new(
        config,
        Arc::new(FileStateStore::new(dir.path().join("state"))),
        Arc::new(InMemoryNotificationScheduler::new()),
        Arc::new(InMemoryRegistrar::new()),
    )
    .with_clock(Arc::new(hive::FixedClock(local_on_sept_10(7, 0))));

    let specs = engine
        .preview(Some(vec![task_in(1, "Trash", sept(10), 0)].as_slice()))
        .await;
    let bodies: Vec<String> = specs
        .iter()
        .map(|s| hive::platform::NotificationTrigger::from(&s.fire_at).to_string())
        .collect();
    assert_eq!(bodies.len(), 2);
    assert!(bodies[0].contains("08:00"), "{bodies:?}");
    assert!(bodies[1].contains("19:00"), "{bodies:?}");
}

#[tokio::test]
async fn test_detached_copy_pass_leaves_ledger_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join(format!("{SLOT_TASK_HANDLES}.json"));
    let tasks = vec![
        task_in(1, "Trash", sept(10), 0),
        task_in(2, "Dishes", sept(10), 1),
    ];

    let app_scheduler = Arc::new(InMemoryNotificationScheduler::new());
    let app = engine_on(
        Arc::new(FileStateStore::new(dir.path())),
        app_scheduler.clone(),
        Arc::new(InMemoryRegistrar::new()),
        local_on_sept_10(7, 0),
    );
    app.apply_all(Some(tasks.as_slice())).await;
    let before = std::fs::read(&ledger_path).unwrap();

    // An operator pass over a copy of the same directory, with adapters that
    // never saw the app's pending notifications.
    let copy = MemoryStateStore::copy_of(&FileStateStore::new(dir.path()))
        .await
        .unwrap();
    let operator = engine_on(
        Arc::new(copy),
        Arc::new(InMemoryNotificationScheduler::new()),
        Arc::new(InMemoryRegistrar::new()),
        local_on_sept_10(7, 0),
    );
    let report = operator.apply_all(Some(tasks.as_slice())).await;
    assert!(!report.reminders.scheduled.is_empty());
    assert_eq!(std::fs::read(&ledger_path).unwrap(), before);

    // The app's next pass still cancels everything it scheduled.
    let report = app.apply_all(Some(tasks.as_slice())).await;
    assert!(report.reminders.cancelled > 0);
    let raw = std::fs::read_to_string(&ledger_path).unwrap();
    let mut stored: Vec<String> = serde_json::from_str(&raw).unwrap();
    let mut live: Vec<String> = app_scheduler
        .pending_handles()
        .into_iter()
        .map(|h| h.0)
        .collect();
    stored.sort();
    live.sort();
    assert_eq!(stored, live);
}
