//! Schedule runner.
//!
//! Scans active schedules once a minute and triggers a scheduled feed when
//! the wall clock matches a schedule's `HH:MM` on one of its weekdays, in
//! the configured timezone. One schedule fires at most once per minute, and
//! a failing feed never stops the loop.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use pawfeed_core::Schedule;
use pawfeed_storage::Storage;

use crate::orchestrator::FeedOrchestrator;

const TICK_INTERVAL: Duration = Duration::from_secs(60);

pub struct ScheduleRunner {
    storage: Storage,
    orchestrator: FeedOrchestrator,
    timezone: Tz,
    /// schedule id → minute stamp of the last firing.
    fired: HashMap<String, String>,
}

impl ScheduleRunner {
    pub fn new(storage: Storage, orchestrator: FeedOrchestrator, timezone: Tz) -> Self {
        Self {
            storage,
            orchestrator,
            timezone,
            fired: HashMap::new(),
        }
    }

    /// Run forever. Spawn this on the runtime.
    pub async fn run(mut self) {
        tracing::info!(timezone = %self.timezone, "schedule runner started");
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            self.tick(Utc::now()).await;
        }
    }

    /// Process one scan. Public for tests.
    pub async fn tick(&mut self, now: DateTime<Utc>) {
        let schedules = match self.storage.schedules().list_active() {
            Ok(schedules) => schedules,
            Err(e) => {
                tracing::error!(error = %e, "failed to load active schedules");
                return;
            }
        };
        if schedules.is_empty() {
            return;
        }

        let local = now.with_timezone(&self.timezone);
        let minute_stamp = local.format("%Y-%m-%d %H:%M").to_string();

        for schedule in schedules {
            if !schedule_due(&schedule, local.weekday().num_days_from_sunday() as u8, &local) {
                continue;
            }
            if self.fired.get(&schedule.id) == Some(&minute_stamp) {
                continue;
            }
            self.fired.insert(schedule.id.clone(), minute_stamp.clone());

            tracing::info!(
                schedule_id = %schedule.id,
                user_id = %schedule.user_id,
                amount = schedule.amount,
                "triggering scheduled feed"
            );
            if let Err(e) = self
                .orchestrator
                .scheduled_feed(&schedule.user_id, schedule.amount, &schedule.id)
                .await
            {
                tracing::error!(schedule_id = %schedule.id, error = %e, "scheduled feed failed");
            }
        }

        // Keep the dedupe map from accumulating entries for deleted schedules.
        self.fired.retain(|_, stamp| stamp == &minute_stamp);
    }
}

/// Whether a schedule matches the current local weekday and `HH:MM`.
fn schedule_due(schedule: &Schedule, weekday: u8, local: &DateTime<Tz>) -> bool {
    if !schedule.days_of_week.contains(&weekday) {
        return false;
    }
    let current = format!("{:02}:{:02}", local.hour(), local.minute());
    schedule.time == current
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schedule_at(time: &str, days: Vec<u8>) -> Schedule {
        Schedule::new("u1", None, time, days, 100)
    }

    fn local(tz: Tz, y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        tz.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_schedule_due_exact_match() {
        let tz: Tz = "Asia/Ho_Chi_Minh".parse().unwrap();
        // 2026-08-03 is a Monday (weekday 1).
        let now = local(tz, 2026, 8, 3, 7, 30);
        let weekday = now.weekday().num_days_from_sunday() as u8;
        assert_eq!(weekday, 1);

        assert!(schedule_due(&schedule_at("07:30", vec![1]), weekday, &now));
        assert!(!schedule_due(&schedule_at("07:31", vec![1]), weekday, &now));
        assert!(!schedule_due(&schedule_at("07:30", vec![0, 6]), weekday, &now));
    }

    #[test]
    fn test_schedule_due_empty_days_never_fires() {
        let tz: Tz = "Asia/Ho_Chi_Minh".parse().unwrap();
        let now = local(tz, 2026, 8, 3, 7, 30);
        let weekday = now.weekday().num_days_from_sunday() as u8;
        assert!(!schedule_due(&schedule_at("07:30", vec![]), weekday, &now));
    }
}
