//! Background trigger handler outcomes.

use hive::platform::PermissionStatus;
use hive::platform::memory::SchedulerCall;
use hive::state::{SLOT_TASKS, StateStore, write_json};
use hive::{BackgroundFetchResult, PreferencesPatch};

use crate::helpers::{local_on_sept_10, sept, task_in, test_engine};

#[tokio::test]
async fn test_disable_then_fire_race() {
    let t = test_engine(local_on_sept_10(7, 0));
    let tasks = vec![task_in(1, "Trash", sept(10), 0)];
    write_json(t.store.as_ref(), SLOT_TASKS, &tasks).await.unwrap();
    t.engine.apply_all(None).await;
    assert_eq!(t.scheduler.pending_handles().len(), 2);

    // The user disables reminders; the trigger fires before the
    // orchestrator has run.
    t.engine
        .settings()
        .update(PreferencesPatch::enabled(false))
        .await
        .unwrap();
    let calls_before = t.scheduler.calls().len();

    let result = t.engine.run_background_refresh().await;

    assert_eq!(result, BackgroundFetchResult::NoData);
    let new_calls = &t.scheduler.calls()[calls_before..];
    assert!(
        new_calls
            .iter()
            .all(|c| matches!(c, SchedulerCall::Cancel(_))),
        "nothing may be scheduled: {new_calls:?}"
    );
    assert!(t.engine.reconciler().ledger().load().await.is_empty());
    assert!(t.scheduler.delivered().is_empty());
}

#[tokio::test]
async fn test_fire_without_permission_is_no_data() {
    let t = test_engine(local_on_sept_10(7, 0));
    t.scheduler.set_permission(PermissionStatus::Denied);
    assert_eq!(
        t.engine.run_background_refresh().await,
        BackgroundFetchResult::NoData
    );
    assert!(t.scheduler.calls().is_empty());
}

#[tokio::test]
async fn test_fire_replans_from_snapshot() {
    let t = test_engine(local_on_sept_10(7, 0));
    t.engine.apply_all(Some(Vec::new().as_slice())).await;

    let tasks = vec![
        task_in(1, "Trash", sept(10), 0),
        task_in(2, "Laundry", sept(10), 1),
    ];
    write_json(t.store.as_ref(), SLOT_TASKS, &tasks).await.unwrap();

    assert_eq!(
        t.engine.run_background_refresh().await,
        BackgroundFetchResult::NewData
    );
    assert_eq!(t.scheduler.pending_handles().len(), 4);
    assert_eq!(t.engine.reconciler().ledger().load().await.len(), 4);
    assert!(t.scheduler.delivered().is_empty());
}

#[tokio::test]
async fn test_fire_with_only_late_tasks_sends_summary_fallback() {
    let t = test_engine(local_on_sept_10(7, 0));
    let tasks = vec![
        task_in(1, "Vacuum", sept(10), 20),
        task_in(2, "Windows", sept(10), 12),
    ];
    write_json(t.store.as_ref(), SLOT_TASKS, &tasks).await.unwrap();

    assert_eq!(
        t.engine.run_background_refresh().await,
        BackgroundFetchResult::NewData
    );
    let delivered = t.scheduler.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].body, "2 to do. Next: Windows");
    assert!(t.scheduler.pending_handles().is_empty());
}

#[tokio::test]
async fn test_fire_with_unreadable_snapshot_sends_generic_fallback() {
    let t = test_engine(local_on_sept_10(7, 0));
    t.store.write(SLOT_TASKS, "{ not json").await.unwrap();

    assert_eq!(
        t.engine.run_background_refresh().await,
        BackgroundFetchResult::NewData
    );
    let delivered = t.scheduler.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(
        delivered[0].body,
        t.engine.config().notifications.fallback_body
    );
}
