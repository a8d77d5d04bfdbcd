//! Shared redb database handle and table definitions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, TableDefinition};

use crate::error::{Error, Result};

/// User records keyed by user id.
pub(crate) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
/// Username → user id index enforcing unique usernames.
pub(crate) const USERS_BY_NAME: TableDefinition<&str, &str> =
    TableDefinition::new("users_by_name");
/// Schedule records keyed by schedule id.
pub(crate) const SCHEDULES: TableDefinition<&str, &[u8]> = TableDefinition::new("schedules");
/// Feed-log records keyed by `<user_id>/<start_millis>/<log_id>` so a prefix
/// scan yields one user's logs in time order.
pub(crate) const FEED_LOGS: TableDefinition<&str, &[u8]> = TableDefinition::new("feed_logs");

/// Shared handle to the embedded database.
pub struct Db {
    db: Arc<Database>,
    /// Temp file backing an in-memory database, removed on drop.
    temp_path: Option<PathBuf>,
}

impl Db {
    /// Open or create the database file, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = if path.exists() {
            Database::open(path)?
        } else {
            Database::create(path)?
        };
        let db = Self {
            db: Arc::new(db),
            temp_path: None,
        };
        db.init_tables()?;
        Ok(db)
    }

    /// Create a throwaway database for tests. redb has no true in-memory
    /// mode, so this is a temp file cleaned up on drop.
    pub fn memory() -> Result<Self> {
        let temp_path =
            std::env::temp_dir().join(format!("pawfeed_{}.redb", uuid::Uuid::new_v4()));
        let db = Database::create(&temp_path)?;
        let db = Self {
            db: Arc::new(db),
            temp_path: Some(temp_path),
        };
        db.init_tables()?;
        Ok(db)
    }

    /// Open every table once so later reads never hit a missing table.
    fn init_tables(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            txn.open_table(USERS)?;
            txn.open_table(USERS_BY_NAME)?;
            txn.open_table(SCHEDULES)?;
            txn.open_table(FEED_LOGS)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub(crate) fn begin_write(&self) -> Result<redb::WriteTransaction> {
        self.db.begin_write().map_err(Error::from)
    }

    pub(crate) fn begin_read(&self) -> Result<redb::ReadTransaction> {
        self.db.begin_read().map_err(Error::from)
    }
}

impl Drop for Db {
    fn drop(&mut self) {
        if let Some(temp_path) = &self.temp_path {
            let _ = std::fs::remove_file(temp_path);
        }
    }
}
