//! Reminder planning.
//!
//! Maps a task snapshot and the current instant to the set of reminders
//! that should exist. Pure and deterministic: no I/O, no clock reads.

use crate::config::{NotificationConfig, ScheduleConfig};
use crate::platform::{NotificationRequest, NotificationTrigger};
use crate::tasks::{Task, TaskId};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// How far away a task's due date is, in calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueCategory {
    Overdue,
    DueToday,
    DueTomorrow,
    /// Two to seven days out.
    DueThisWeek,
    /// More than seven days out. Gets no reminders until it moves closer.
    DueLater,
}

impl DueCategory {
    /// Categorize a calendar-day difference (`due - today`).
    pub fn from_diff_days(diff_days: i64) -> Self {
        match diff_days {
            d if d < 0 => Self::Overdue,
            0 => Self::DueToday,
            1 => Self::DueTomorrow,
            2..=7 => Self::DueThisWeek,
            _ => Self::DueLater,
        }
    }

    /// Notification title for this category.
    pub fn title(self) -> &'static str {
        match self {
            Self::Overdue => "Overdue task",
            Self::DueToday => "Task due today",
            Self::DueTomorrow => "Task due tomorrow",
            Self::DueThisWeek | Self::DueLater => "Upcoming task",
        }
    }
}

impl fmt::Display for DueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Overdue => "overdue",
            Self::DueToday => "due today",
            Self::DueTomorrow => "due tomorrow",
            Self::DueThisWeek => "due this week",
            Self::DueLater => "due later",
        };
        f.write_str(label)
    }
}

/// When a planned reminder fires.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FireAt {
    /// Once, at an absolute instant.
    Once {
        /// Fire instant in the planning timezone.
        at: DateTime<FixedOffset>,
    },
    /// Every day at a local wall-clock time. Used for overdue tasks, which
    /// have no natural expiry.
    Daily {
        hour: u32,
        minute: u32,
    },
}

impl From<&FireAt> for NotificationTrigger {
    fn from(fire_at: &FireAt) -> Self {
        match fire_at {
            FireAt::Once { at } => Self::At { at: *at },
            FireAt::Daily { hour, minute } => Self::Daily {
                hour: *hour,
                minute: *minute,
            },
        }
    }
}

/// One reminder that should exist. Created fresh on every planning pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReminderSpec {
    pub fire_at: FireAt,
    pub title: String,
    pub body: String,
    /// Task this reminder belongs to. Several specs may share one task.
    pub correlation_id: Option<TaskId>,
    pub category: DueCategory,
}

impl ReminderSpec {
    /// Build the platform request for this reminder.
    pub fn to_request(&self, payload: &NotificationConfig) -> NotificationRequest {
        NotificationRequest {
            title: self.title.clone(),
            body: self.body.clone(),
            trigger: NotificationTrigger::from(&self.fire_at),
            correlation_id: self.correlation_id.clone(),
            deep_link: Some(payload.deep_link.clone()),
            channel_id: Some(payload.channel_id.clone()),
        }
    }
}

/// Whole calendar days from `today` to `due`, independent of time of day.
pub fn days_between(today: NaiveDate, due: NaiveDate) -> i64 {
    (due - today).num_days()
}

/// Computes the desired reminder set for a task snapshot.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    times: ScheduleConfig,
}

impl Planner {
    /// Planner using the given local fire times.
    pub fn new(times: ScheduleConfig) -> Self {
        Self { times }
    }

    /// Plan reminders for `tasks` as seen at `now`.
    ///
    /// Fire times are local wall-clock times in `now`'s timezone. Absolute
    /// times that are not strictly after `now` are dropped. Output follows
    /// task order.
    pub fn plan<Tz: TimeZone>(&self, tasks: &[Task], now: &DateTime<Tz>) -> Vec<ReminderSpec> {
        let today = now.date_naive();
        let mut specs = Vec::new();

        for task in tasks {
            if task.completed {
                continue;
            }
            let Some(due) = task.due_day(now) else {
                continue;
            };
            let diff_days = days_between(today, due);
            let category = DueCategory::from_diff_days(diff_days);
            let title = task.display_title();

            if category == DueCategory::Overdue {
                specs.push(ReminderSpec {
                    fire_at: FireAt::Daily {
                        hour: self.times.overdue_hour,
                        minute: 0,
                    },
                    title: category.title().to_owned(),
                    body: format!("{title} overdue ({}d)", diff_days.abs()),
                    correlation_id: task.id.clone(),
                    category,
                });
                continue;
            }
            if category == DueCategory::DueLater {
                continue;
            }

            let body = match category {
                DueCategory::DueToday => format!("{title} today"),
                DueCategory::DueTomorrow => format!("{title} tomorrow"),
                _ => format!("{title} in {diff_days}d"),
            };

            let mut fire_times = Vec::with_capacity(2);
            if diff_days == 1 {
                fire_times.push(local_time(now, due - Duration::days(1), self.times.day_before_hour));
            }
            fire_times.push(local_time(now, due, self.times.morning_hour));
            if diff_days == 0 {
                fire_times.push(local_time(now, due, self.times.evening_hour));
            }

            for at in fire_times.into_iter().flatten() {
                if at <= *now {
                    continue;
                }
                specs.push(ReminderSpec {
                    fire_at: FireAt::Once {
                        at: at.fixed_offset(),
                    },
                    title: category.title().to_owned(),
                    body: body.clone(),
                    correlation_id: task.id.clone(),
                    category,
                });
            }
        }

        specs
    }
}

/// `date` at `hour`:00 in `reference`'s timezone.
///
/// Returns `None` when the wall-clock time does not exist (DST gap).
fn local_time<Tz: TimeZone>(reference: &DateTime<Tz>, date: NaiveDate, hour: u32) -> Option<DateTime<Tz>> {
    let naive = date.and_hms_opt(hour, 0, 0)?;
    let local = reference.timezone().from_local_datetime(&naive).earliest();
    if local.is_none() {
        debug!(%date, hour, "skipping reminder at nonexistent local time");
    }
    local
}

/// Plan with the default fire times.
pub fn plan<Tz: TimeZone>(tasks: &[Task], now: &DateTime<Tz>) -> Vec<ReminderSpec> {
    Planner::default().plan(tasks, now)
}
