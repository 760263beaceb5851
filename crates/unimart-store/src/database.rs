//! The device-local SQLite database.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, StoreError};
use crate::migrations;

const DB_FILE: &str = "unimart.db";

/// An open, fully migrated database. Typed accessors live in the
/// `favorites`, `session` and `settings` modules.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open `unimart.db` in the platform data directory, e.g.
    /// `~/.local/share/unimart/` on Linux.
    pub fn new() -> Result<Self> {
        let dirs = ProjectDirs::from("edu", "unimart", "unimart").ok_or(StoreError::NoDataDir)?;
        let path = dirs.data_dir().join(DB_FILE);
        info!(path = %path.display(), "opening local database");
        Self::open_at(&path)
    }

    /// Open or create the database at `path`, creating missing parent
    /// directories.
    pub fn open_at(path: &Path) -> Result<Self> {
        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)?,
            _ => {}
        }
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        migrations::run_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    /// Gone when the handle is dropped.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrations::run_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// File backing the database; `None` when in memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().filter(|p| !p.is_empty()).map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");

        let db = Database::open_at(&path).expect("should open");
        assert!(db.path().is_some());
        drop(db);

        // Re-opening runs migrations again without failing.
        Database::open_at(&path).expect("should reopen");
    }

    #[test]
    fn in_memory_has_schema() {
        let db = Database::open_in_memory().unwrap();
        let version: u32 = db
            .conn()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, crate::migrations::CURRENT_VERSION);
    }
}
