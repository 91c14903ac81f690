//! Planner behaviour across category boundaries and fire-time filtering.

use std::collections::HashSet;

use hive::reminders::plan::{self, DueCategory, FireAt};
use hive::{ReminderSpec, Task};

use crate::helpers::{instant, sept, task_in};

fn once_times(specs: &[ReminderSpec]) -> Vec<String> {
    specs
        .iter()
        .filter_map(|s| match &s.fire_at {
            FireAt::Once { at } => Some(at.format("%Y-%m-%d %H:%M").to_string()),
            FireAt::Daily { .. } => None,
        })
        .collect()
}

#[test]
fn test_overdue_task_yields_only_recurring_spec() {
    let now = instant("2025-09-10T12:00:00+02:00");
    let specs = plan::plan(&[Task::new(1, "Dishes", sept(9))], &now);

    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].category, DueCategory::Overdue);
    assert_eq!(specs[0].fire_at, FireAt::Daily { hour: 10, minute: 0 });
    assert!(once_times(&specs).is_empty(), "no backdated one-shots");
}

#[test]
fn test_due_tomorrow_boundary() {
    let now = instant("2025-09-10T12:00:00+02:00");
    let specs = plan::plan(&[task_in(1, "Laundry", sept(10), 1)], &now);

    assert!(specs.iter().all(|s| s.category == DueCategory::DueTomorrow));
    assert_eq!(
        once_times(&specs),
        vec!["2025-09-10 18:00", "2025-09-11 09:00"]
    );
}

#[test]
fn test_due_tomorrow_just_before_midnight() {
    // One minute before midnight, tomorrow is still tomorrow.
    let now = instant("2025-09-10T23:59:00+02:00");
    let specs = plan::plan(&[task_in(1, "Laundry", sept(10), 1)], &now);
    assert!(specs.iter().all(|s| s.category == DueCategory::DueTomorrow));
    assert_eq!(once_times(&specs), vec!["2025-09-11 09:00"]);
}

#[test]
fn test_scenario_trash_and_vacuum() {
    let now = instant("2025-09-10T07:00:00+02:00");
    let tasks = [
        task_in(1, "Trash", sept(10), 0),
        task_in(2, "Vacuum", sept(10), 10),
    ];
    let specs = plan::plan(&tasks, &now);

    assert_eq!(once_times(&specs), vec!["2025-09-10 09:00", "2025-09-10 17:00"]);
    assert!(
        specs
            .iter()
            .all(|s| s.correlation_id == Some(hive::TaskId::Number(1)))
    );
}

#[test]
fn test_no_spec_fires_at_or_before_now() {
    let now = instant("2025-09-10T09:00:00+02:00");
    let tasks: Vec<Task> = (-3..=9)
        .map(|d| task_in(d, &format!("Task {d}"), sept(10), d))
        .collect();
    for spec in plan::plan(&tasks, &now) {
        if let FireAt::Once { at } = spec.fire_at {
            assert!(at > now, "{spec:?} fires at or before now");
        }
    }
}

#[test]
fn test_plan_is_deterministic_order_insensitive() {
    let now = instant("2025-09-10T06:00:00+00:00");
    let tasks: Vec<Task> = (-2..=8)
        .map(|d| task_in(d, "Chore", sept(10), d))
        .collect();

    let first: HashSet<ReminderSpec> = plan::plan(&tasks, &now).into_iter().collect();
    let mut reversed = tasks.clone();
    reversed.reverse();
    let second: HashSet<ReminderSpec> = plan::plan(&reversed, &now).into_iter().collect();

    assert_eq!(first, second);
}

#[test]
fn test_legacy_snapshot_is_planned() {
    let json = r#"[
        {"id": 1, "titre": "Trash", "dueDate": "2025-09-10", "done": false},
        {"id": 2, "titre": "Old", "dueDate": "2025-09-10", "done": true}
    ]"#;
    let tasks: Vec<Task> = serde_json::from_str(json).unwrap();
    let now = instant("2025-09-10T07:00:00+02:00");
    let specs = plan::plan(&tasks, &now);
    assert_eq!(specs.len(), 2);
    assert!(specs.iter().all(|s| s.body == "Trash today"));
}
