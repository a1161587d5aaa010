//! Database connection management.
//!
//! The [`Database`] struct owns a single [`rusqlite::Connection`] behind a
//! mutex and guarantees that migrations are run before any other operation.
//! Every typed helper takes the lock for the duration of one statement (or
//! one transaction), so the sync writer and concurrent readers interleave
//! without sharing a connection unsafely.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::Connection;

use chatsync_shared::constants::APP_NAME;

use crate::error::{Result, StoreError};
use crate::migrations;

/// How long a statement waits on a locked database file before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Thread-safe wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    fts: bool,
}

impl Database {
    /// Open (or create) the default archive.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/chatsync/chatsync.db`
    /// - macOS:   `~/Library/Application Support/com.chatsync.chatsync/chatsync.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\chatsync\chatsync\data\chatsync.db`
    pub fn open_default() -> Result<Self> {
        let db_path = default_path()?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        migrations::run_migrations(&conn)?;
        let fts = migrations::fts_available(&conn)?;
        if !fts {
            tracing::warn!("FTS5 index unavailable, search falls back to LIKE");
        }

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
            fts,
        })
    }

    /// Lock the underlying connection.
    ///
    /// Callers should prefer the typed helpers; direct access is for
    /// transactions or ad-hoc queries. Do not hold the guard across an
    /// `.await`.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Whether message search is served by the FTS5 index.
    pub fn has_fts(&self) -> bool {
        self.fts
    }

    /// Return the filesystem path of the open database.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Location of the default archive file.
pub fn default_path() -> Result<PathBuf> {
    let project_dirs =
        ProjectDirs::from("com", APP_NAME, APP_NAME).ok_or(StoreError::NoDataDir)?;
    Ok(project_dirs.data_dir().join(format!("{APP_NAME}.db")))
}

/// Convert a stored unix-seconds column into a timestamp.
pub(crate) fn timestamp_column(secs: i64, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(&dir.path().join("test.db")).expect("should open");
    (dir, db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_round_trip() {
        let (_dir, db) = test_db();
        assert!(db.path().is_some());
        assert!(db.has_fts(), "bundled SQLite ships FTS5");
    }

    #[test]
    fn default_path_is_named_after_the_app() {
        // Some CI sandboxes have no home directory at all.
        if let Ok(path) = default_path() {
            assert_eq!(path.file_name().unwrap(), "chatsync.db");
        }
    }

    #[test]
    fn reopen_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let db = Database::open_at(&path).unwrap();
            db.conn()
                .unwrap()
                .execute(
                    "INSERT INTO chats (jid, kind, name, last_message_ts) VALUES ('a@g.us', 'group', 'A', 0)",
                    [],
                )
                .unwrap();
        }

        let db = Database::open_at(&path).unwrap();
        let count: i64 = db
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM chats", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
