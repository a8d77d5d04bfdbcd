//! User account persistence.

use std::sync::Arc;

use chrono::Utc;
use pawfeed_core::User;
use redb::ReadableTable;

use crate::db::{Db, USERS, USERS_BY_NAME};
use crate::error::{Error, Result};

/// CRUD access to user records, with a unique-username index.
#[derive(Clone)]
pub struct UserStore {
    db: Arc<Db>,
}

impl UserStore {
    pub(crate) fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Persist a new user. Fails with `Conflict` when the username is taken.
    pub fn create(&self, user: &User) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut by_name = txn.open_table(USERS_BY_NAME)?;
            if by_name.get(user.username.as_str())?.is_some() {
                return Err(Error::Conflict(format!(
                    "username already exists: {}",
                    user.username
                )));
            }
            by_name.insert(user.username.as_str(), user.id.as_str())?;

            let mut users = txn.open_table(USERS)?;
            let bytes = serde_json::to_vec(user)?;
            users.insert(user.id.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        tracing::info!(username = %user.username, "user created");
        Ok(())
    }

    /// Fetch a user by id.
    pub fn get(&self, id: &str) -> Result<Option<User>> {
        let txn = self.db.begin_read()?;
        let users = txn.open_table(USERS)?;
        match users.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Fetch a user by username via the index.
    pub fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let txn = self.db.begin_read()?;
        let by_name = txn.open_table(USERS_BY_NAME)?;
        let id = match by_name.get(username)? {
            Some(guard) => guard.value().to_string(),
            None => return Ok(None),
        };
        let users = txn.open_table(USERS)?;
        match users.get(id.as_str())? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Stamp the user's last-online time to now.
    pub fn touch_last_online(&self, id: &str) -> Result<User> {
        let txn = self.db.begin_write()?;
        let user = {
            let mut users = txn.open_table(USERS)?;
            let mut user: User = match users.get(id)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Err(Error::NotFound(format!("user: {id}"))),
            };
            user.last_online = Some(Utc::now());
            let bytes = serde_json::to_vec(&user)?;
            users.insert(id, bytes.as_slice())?;
            user
        };
        txn.commit()?;
        Ok(user)
    }

    /// Whether any user exists at all (bootstrap check).
    pub fn any(&self) -> Result<bool> {
        let txn = self.db.begin_read()?;
        let users = txn.open_table(USERS)?;
        let any = users.iter()?.next().is_some();
        Ok(any)
    }
}
