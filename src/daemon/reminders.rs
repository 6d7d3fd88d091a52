//! Due alarm and task detection. Every reminder fires once for the minute it matches.

use std::{collections::HashSet, time::Duration};

use chrono::{NaiveDate, NaiveTime, Timelike};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    planner::{day_index::resolve, state::PlannerState, Planner},
    storage::snapshot::SnapshotStorage,
    utils::{clock::Clock, time::truncate_to_minute},
};

pub const DEFAULT_CHECK_FREQUENCY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    /// Identifies the reminder within its minute.
    pub key: String,
    pub title: String,
    pub body: String,
}

/// Reminders due at `now`: enabled alarms set to this minute and today's unfinished tasks
/// scheduled for it.
pub fn due_reminders(state: &PlannerState, today: NaiveDate, now: NaiveTime) -> Vec<Reminder> {
    let minute = truncate_to_minute(now);
    let stamp = minute.format("%H:%M");

    let alarms = state
        .alarms
        .iter()
        .filter(|v| v.enabled && truncate_to_minute(v.time) == minute)
        .map(|alarm| Reminder {
            key: format!("alarm-{}-{stamp}", alarm.id),
            title: format!("Ramadan Reminder: {}", alarm.kind),
            body: format!("It's time for {}!", alarm.kind.to_lowercase()),
        });

    let day = resolve(state.period.start_date(), today);
    let tasks = state
        .tasks_for(day)
        .iter()
        .filter(|v| !v.completed && v.time.map(truncate_to_minute) == Some(minute))
        .map(|task| Reminder {
            key: format!("task-{}-{stamp}", task.id),
            title: "Task Reminder".to_string(),
            body: task.text.clone(),
        });

    alarms.chain(tasks).collect()
}

pub struct ReminderModule<S: SnapshotStorage> {
    planner: Planner<S>,
    shutdown: CancellationToken,
    check_frequency: Duration,
    clock: Box<dyn Clock>,
    notified: HashSet<String>,
}

impl<S: SnapshotStorage> ReminderModule<S> {
    pub fn new(
        planner: Planner<S>,
        shutdown: CancellationToken,
        check_frequency: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            planner,
            shutdown,
            check_frequency,
            clock,
            notified: HashSet::new(),
        }
    }

    /// Reminders that became due since the last check.
    pub async fn check(&mut self) -> Vec<Reminder> {
        let state = self.planner.snapshot().await;
        if !state.notifications_enabled {
            return vec![];
        }
        let now = self.clock.local_time();
        let stamp = format!("{:02}:{:02}", now.hour(), now.minute());
        // Keys of past minutes can never match again.
        self.notified.retain(|key| key.ends_with(&stamp));

        due_reminders(&state, now.date_naive(), now.time())
            .into_iter()
            .filter(|v| self.notified.insert(v.key.clone()))
            .collect()
    }

    pub async fn run(mut self) {
        let mut check_point = self.clock.instant();
        loop {
            check_point += self.check_frequency;

            for reminder in self.check().await {
                info!(key = %reminder.key, "{}: {}", reminder.title, reminder.body);
            }
            debug!("Reminder check finished");

            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = self.clock.sleep_until(check_point) => ()
            }
        }
    }
}
