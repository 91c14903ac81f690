//! End-to-end engine passes over in-memory platform adapters.

use chrono::Timelike;
use hive::platform::memory::RegistrarCall;
use hive::platform::{BackgroundStatus, NotificationTrigger, PermissionStatus};
use hive::settings::{CADENCE_CEILING_MINUTES, CADENCE_FLOOR_MINUTES};
use hive::{CadenceState, PreferencesPatch};

use crate::helpers::{local_on_sept_10, sept, task_in, test_engine};

const TASK_NAME: &str = "task-reminder-background";

#[tokio::test]
async fn test_scenario_trash_today_vacuum_later_cadence_30() {
    let t = test_engine(local_on_sept_10(7, 0));
    t.engine
        .settings()
        .update(PreferencesPatch::cadence(30))
        .await
        .unwrap();

    let tasks = vec![
        task_in(1, "Trash", sept(10), 0),
        task_in(2, "Vacuum", sept(10), 10),
    ];
    let report = t.engine.apply_all(Some(tasks.as_slice())).await;

    assert_eq!(report.planned, 2);
    assert_eq!(report.reminders.scheduled.len(), 2);
    assert_eq!(
        report.cadence,
        Some(CadenceState::Registered { interval_secs: 1800 })
    );
    assert_eq!(t.registrar.interval_of(TASK_NAME), Some(1800));

    let mut hours: Vec<u32> = t
        .scheduler
        .pending()
        .into_iter()
        .filter_map(|r| match r.trigger {
            NotificationTrigger::At { at } => Some(at.hour()),
            _ => None,
        })
        .collect();
    hours.sort_unstable();
    assert_eq!(hours, vec![9, 17]);
}

#[tokio::test]
async fn test_cadence_clamping() {
    let t = test_engine(local_on_sept_10(7, 0));
    let low = t
        .engine
        .update_preferences(PreferencesPatch::cadence(5))
        .await
        .unwrap();
    assert_eq!(low.preferences.cadence_minutes, CADENCE_FLOOR_MINUTES);
    assert_eq!(t.engine.settings().get().await.cadence_minutes, 15);
    assert_eq!(t.registrar.interval_of(TASK_NAME), Some(900));

    let high = t
        .engine
        .update_preferences(PreferencesPatch::cadence(10_000))
        .await
        .unwrap();
    assert_eq!(high.preferences.cadence_minutes, CADENCE_CEILING_MINUTES);
    assert_eq!(t.registrar.interval_of(TASK_NAME), Some(240 * 60));
}

#[tokio::test]
async fn test_repeated_launches_do_not_duplicate() {
    let t = test_engine(local_on_sept_10(7, 0));
    let tasks = vec![task_in(1, "Trash", sept(10), 0)];
    for _ in 0..5 {
        t.engine.apply_all(Some(tasks.as_slice())).await;
    }
    assert_eq!(t.scheduler.pending_handles().len(), 2);
    assert_eq!(t.registrar.trigger_count(), 1);
    assert_eq!(t.registrar.duplicate_registrations(), 0);
    let registers = t
        .registrar
        .calls()
        .iter()
        .filter(|c| matches!(c, RegistrarCall::Register { .. }))
        .count();
    assert_eq!(registers, 1);
}

#[tokio::test]
async fn test_completing_task_removes_its_reminders() {
    let t = test_engine(local_on_sept_10(7, 0));
    let mut tasks = vec![
        task_in(1, "Trash", sept(10), 0),
        task_in(2, "Laundry", sept(10), 1),
    ];
    t.engine.apply_all(Some(tasks.as_slice())).await;
    assert_eq!(t.scheduler.pending_handles().len(), 4);

    tasks[0].completed = true;
    t.engine.apply_all(Some(tasks.as_slice())).await;

    let bodies: Vec<String> = t.scheduler.pending().into_iter().map(|r| r.body).collect();
    assert_eq!(bodies.len(), 2);
    assert!(bodies.iter().all(|b| b == "Laundry tomorrow"));
}

#[tokio::test]
async fn test_first_apply_prompts_for_permission() {
    let t = test_engine(local_on_sept_10(7, 0));
    t.scheduler.set_permission(PermissionStatus::Undetermined);
    t.scheduler.set_grant_on_request(false);

    let report = t
        .engine
        .apply_all(Some(vec![task_in(1, "Trash", sept(10), 0)].as_slice()))
        .await;

    assert_eq!(report.reminders.permission, PermissionStatus::Denied);
    assert!(report.reminders.scheduled.is_empty());
    // Background registration is independent of notification permission.
    assert!(report.cadence.is_some());
}

#[tokio::test]
async fn test_restricted_background_still_schedules_reminders() {
    let t = test_engine(local_on_sept_10(7, 0));
    t.registrar.set_status(BackgroundStatus::Restricted);
    let report = t
        .engine
        .apply_all(Some(vec![task_in(1, "Trash", sept(10), 0)].as_slice()))
        .await;
    assert_eq!(report.reminders.scheduled.len(), 2);
    assert!(report.cadence.is_none());
    assert!(
        report
            .cadence_error
            .as_deref()
            .is_some_and(|e| e.contains("restricted"))
    );
}

#[tokio::test]
async fn test_reenable_restores_everything() {
    let t = test_engine(local_on_sept_10(7, 0));
    t.engine.apply_all(Some(vec![task_in(1, "Trash", sept(10), 0)].as_slice())).await;

    hive::state::write_json(
        t.store.as_ref(),
        hive::state::SLOT_TASKS,
        &vec![task_in(1, "Trash", sept(10), 0)],
    )
    .await
    .unwrap();

    t.engine
        .update_preferences(PreferencesPatch::enabled(false))
        .await
        .unwrap();
    assert!(t.scheduler.pending_handles().is_empty());
    assert_eq!(t.registrar.trigger_count(), 0);

    let report = t
        .engine
        .update_preferences(PreferencesPatch::enabled(true))
        .await
        .unwrap();
    assert_eq!(report.reminders.scheduled.len(), 2);
    assert_eq!(t.registrar.trigger_count(), 1);
}
