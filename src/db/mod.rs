//! SQLite store. The persistence daemon is the sole owner of a [`Store`];
//! every write goes through its parameterized repository methods; raw SQL
//! interpolation is never used.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{error, info};
use rusqlite::Connection;

mod migrations;
pub mod models;
mod repositories;

use migrations::run_migrations;

pub struct Store {
    conn: Connection,
    db_path: PathBuf,
}

impl Store {
    /// Opens (creating if needed) the store at `db_path`, enables WAL and
    /// referential integrity, and brings the schema up to date. Failure here
    /// is fatal to startup: the engine refuses to run without a store.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let mut conn = Connection::open(db_path)
            .with_context(|| format!("failed to open SQLite database {}", db_path.display()))?;

        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            error!("Failed to enable WAL mode: {err}");
        }
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign keys")?;

        run_migrations(&mut conn).context("failed to run database migrations")?;

        info!("Database initialized at {}", db_path.display());

        Ok(Self {
            conn,
            db_path: db_path.to_path_buf(),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign keys")?;
        run_migrations(&mut conn).context("failed to run database migrations")?;
        Ok(Self {
            conn,
            db_path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let dir = std::env::temp_dir().join(format!("leafsense_db_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("reopen.db");
        let _ = std::fs::remove_file(&path);

        Store::open(&path).unwrap();
        // Second open must see user_version at current and change nothing.
        let store = Store::open(&path).unwrap();
        let version: i32 = store
            .conn()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn foreign_keys_are_enabled() {
        let store = Store::open_in_memory().unwrap();
        let on: i32 = store
            .conn()
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(on, 1);
    }
}
