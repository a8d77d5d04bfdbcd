//! Embedded persistence for the PawFeed backend.
//!
//! One redb database file holds users, schedules and feed logs; the typed
//! stores share the database handle. Callers get a [`Storage`] facade and
//! never touch redb directly.

pub mod db;
pub mod error;
pub mod feed_logs;
pub mod schedules;
pub mod users;

use std::path::Path;
use std::sync::Arc;

pub use error::{Error, Result};
pub use feed_logs::FeedLogStore;
pub use schedules::{ScheduleStore, ScheduleUpdate};
pub use users::UserStore;

use db::Db;

const DB_FILE: &str = "pawfeed.redb";

/// Handle to all persistent state.
#[derive(Clone)]
pub struct Storage {
    users: UserStore,
    schedules: ScheduleStore,
    feed_logs: FeedLogStore,
}

impl Storage {
    /// Open (or create) the database under `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let path = data_dir.as_ref().join(DB_FILE);
        tracing::info!(path = %path.display(), "opening storage");
        Ok(Self::from_db(Arc::new(Db::open(path)?)))
    }

    /// Throwaway database for tests.
    pub fn memory() -> Result<Self> {
        Ok(Self::from_db(Arc::new(Db::memory()?)))
    }

    fn from_db(db: Arc<Db>) -> Self {
        Self {
            users: UserStore::new(db.clone()),
            schedules: ScheduleStore::new(db.clone()),
            feed_logs: FeedLogStore::new(db),
        }
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    pub fn schedules(&self) -> &ScheduleStore {
        &self.schedules
    }

    pub fn feed_logs(&self) -> &FeedLogStore {
        &self.feed_logs
    }
}
