//! Feed-log persistence and daily aggregation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use pawfeed_core::{DailyFeedStats, FeedLog};
use redb::ReadableTable;

use crate::db::{Db, FEED_LOGS};
use crate::error::Result;

/// Append-style access to feed logs.
///
/// Keys are `<user_id>/<start_millis>/<log_id>`, so one range scan walks a
/// user's history in time order.
#[derive(Clone)]
pub struct FeedLogStore {
    db: Arc<Db>,
}

fn log_key(log: &FeedLog) -> String {
    format!(
        "{}/{:013}/{}",
        log.user_id,
        log.start_time.timestamp_millis().max(0),
        log.id
    )
}

fn user_range(user_id: &str) -> (String, String) {
    // '0' is the byte after '/', so this bounds exactly one user's keys.
    (format!("{user_id}/"), format!("{user_id}0"))
}

impl FeedLogStore {
    pub(crate) fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    pub fn insert(&self, log: &FeedLog) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(FEED_LOGS)?;
            let key = log_key(log);
            let bytes = serde_json::to_vec(log)?;
            table.insert(key.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Most recent logs first, up to `limit`.
    pub fn recent_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<FeedLog>> {
        let (start, end) = user_range(user_id);
        let txn = self.db.begin_read()?;
        let table = txn.open_table(FEED_LOGS)?;

        let mut logs = Vec::new();
        for item in table.range(start.as_str()..end.as_str())?.rev() {
            if logs.len() >= limit {
                break;
            }
            let (_, value) = item?;
            logs.push(serde_json::from_slice(value.value())?);
        }
        Ok(logs)
    }

    /// All of a user's logs starting at or after `since`.
    pub fn since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<FeedLog>> {
        let (start, end) = user_range(user_id);
        let txn = self.db.begin_read()?;
        let table = txn.open_table(FEED_LOGS)?;

        let mut logs = Vec::new();
        for item in table.range(start.as_str()..end.as_str())? {
            let (_, value) = item?;
            let log: FeedLog = serde_json::from_slice(value.value())?;
            if log.start_time >= since {
                logs.push(log);
            }
        }
        Ok(logs)
    }

    /// Per-day totals over the last `days` calendar days in `tz`, oldest
    /// first, with zero-filled entries for days without feeds.
    pub fn daily_stats(
        &self,
        user_id: &str,
        days: u32,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Result<Vec<DailyFeedStats>> {
        let days = days.max(1) as i64;
        let today = now.with_timezone(&tz).date_naive();
        let window_start_day = today - Duration::days(days - 1);
        let window_start = tz
            .from_local_datetime(&window_start_day.and_hms_opt(0, 0, 0).unwrap())
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now - Duration::days(days));

        let mut buckets: HashMap<String, (u64, u64)> = HashMap::new();
        for log in self.since(user_id, window_start)? {
            let date = log
                .start_time
                .with_timezone(&tz)
                .format("%Y-%m-%d")
                .to_string();
            let bucket = buckets.entry(date).or_insert((0, 0));
            bucket.0 += log.amount as u64;
            bucket.1 += 1;
        }

        let mut stats = Vec::with_capacity(days as usize);
        for offset in (0..days).rev() {
            let date = (today - Duration::days(offset))
                .format("%Y-%m-%d")
                .to_string();
            let (total_amount, feed_count) = buckets.get(&date).copied().unwrap_or((0, 0));
            stats.push(DailyFeedStats {
                date,
                total_amount,
                feed_count,
            });
        }
        Ok(stats)
    }
}
