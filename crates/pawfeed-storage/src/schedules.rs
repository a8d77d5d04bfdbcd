//! Feeding-schedule persistence.

use std::sync::Arc;

use chrono::Utc;
use pawfeed_core::Schedule;
use redb::ReadableTable;

use crate::db::{Db, SCHEDULES};
use crate::error::{Error, Result};

/// Fields a schedule update may change.
#[derive(Debug, Clone, Default)]
pub struct ScheduleUpdate {
    pub name: Option<String>,
    pub time: Option<String>,
    pub days_of_week: Option<Vec<u8>>,
    pub amount: Option<u32>,
}

/// CRUD access to schedules.
#[derive(Clone)]
pub struct ScheduleStore {
    db: Arc<Db>,
}

impl ScheduleStore {
    pub(crate) fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    pub fn create(&self, schedule: &Schedule) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SCHEDULES)?;
            let bytes = serde_json::to_vec(schedule)?;
            table.insert(schedule.id.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Schedule>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SCHEDULES)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// A user's schedules, sorted by wall-clock time.
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<Schedule>> {
        let mut schedules = self.scan(|s| s.user_id == user_id)?;
        schedules.sort_by(|a, b| a.time.cmp(&b.time));
        Ok(schedules)
    }

    /// Every active schedule, any user. Used by the schedule runner.
    pub fn list_active(&self) -> Result<Vec<Schedule>> {
        self.scan(|s| s.is_active)
    }

    /// Apply an update to a user's schedule. `NotFound` covers both a missing
    /// id and another user's schedule.
    pub fn update(&self, user_id: &str, id: &str, update: ScheduleUpdate) -> Result<Schedule> {
        self.mutate(user_id, id, |schedule| {
            if let Some(name) = update.name.clone() {
                schedule.name = name;
            }
            if let Some(time) = update.time.clone() {
                schedule.time = time;
            }
            if let Some(days) = update.days_of_week.clone() {
                schedule.days_of_week = days;
            }
            if let Some(amount) = update.amount {
                schedule.amount = amount;
            }
        })
    }

    /// Set or flip the active flag.
    pub fn toggle(&self, user_id: &str, id: &str, is_active: Option<bool>) -> Result<Schedule> {
        self.mutate(user_id, id, |schedule| {
            schedule.is_active = is_active.unwrap_or(!schedule.is_active);
        })
    }

    pub fn delete(&self, user_id: &str, id: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SCHEDULES)?;
            let owned = match table.get(id)? {
                Some(guard) => {
                    let schedule: Schedule = serde_json::from_slice(guard.value())?;
                    schedule.user_id == user_id
                }
                None => false,
            };
            if !owned {
                return Err(Error::NotFound(format!("schedule: {id}")));
            }
            table.remove(id)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn mutate(
        &self,
        user_id: &str,
        id: &str,
        apply: impl FnOnce(&mut Schedule),
    ) -> Result<Schedule> {
        let txn = self.db.begin_write()?;
        let schedule = {
            let mut table = txn.open_table(SCHEDULES)?;
            let mut schedule: Schedule = match table.get(id)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Err(Error::NotFound(format!("schedule: {id}"))),
            };
            if schedule.user_id != user_id {
                return Err(Error::NotFound(format!("schedule: {id}")));
            }
            apply(&mut schedule);
            schedule.updated_at = Utc::now();
            let bytes = serde_json::to_vec(&schedule)?;
            table.insert(id, bytes.as_slice())?;
            schedule
        };
        txn.commit()?;
        Ok(schedule)
    }

    fn scan(&self, keep: impl Fn(&Schedule) -> bool) -> Result<Vec<Schedule>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SCHEDULES)?;
        let mut schedules = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            let schedule: Schedule = serde_json::from_slice(value.value())?;
            if keep(&schedule) {
                schedules.push(schedule);
            }
        }
        Ok(schedules)
    }
}
