//! SQLite store for merge history and NSX connection profiles.

pub mod queries;
pub mod schema;

pub use queries::{format_bytes, DbInfo, DEFAULT_HISTORY_LIMIT};

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::errors::DatabaseError;

/// Pragmas applied to every file-backed connection.
const FILE_PRAGMAS: &str = "PRAGMA journal_mode = WAL;
                            PRAGMA foreign_keys = ON;
                            PRAGMA busy_timeout = 5000;";

/// Shared handle to the store.
///
/// A single connection behind a `Mutex`; handlers share one `Database`
/// through `Arc`.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Connect to the file at `path` without touching the schema. Missing
    /// parent directories are created.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(FILE_PRAGMAS)?;
        debug!(path = %path.display(), "connected to database");

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Scratch database for tests. The schema is not created.
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// [`Database::new`] followed by [`Database::initialize`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let db = Self::new(path)?;
        db.initialize()?;
        Ok(db)
    }

    /// Apply pending migrations.
    pub fn initialize(&self) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let version = schema::run_migrations(&conn)?;
        info!(
            path = %self.path.as_deref().map_or_else(|| ":memory:".into(), |p| p.display().to_string()),
            schema_version = version,
            "database ready"
        );
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Lock the connection. A poisoned lock is taken over, since a panic
    /// in another handler leaves SQLite itself consistent.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("database lock was poisoned; continuing");
            poisoned.into_inner()
        })
    }
}
