// Local SQLite store for workspace state
// Handles app data directory resolution and the shared connection

use rusqlite::{Connection, Result as SqliteResult};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Failed to get app data directory")]
    AppDataDir,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage connection lock poisoned")]
    Poisoned,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Editor state and settings that outlive a process
pub struct WorkspaceStore {
    connection: Mutex<Connection>,
    db_path: PathBuf,
}

impl WorkspaceStore {
    /// Open (or create) the store at `db_path`
    pub fn new(db_path: PathBuf) -> StorageResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let connection = Connection::open(&db_path)?;
        let store = Self {
            connection: Mutex::new(connection),
            db_path,
        };
        store.init_schema()?;

        tracing::debug!(path = %store.db_path.display(), "workspace store opened");
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn init_schema(&self) -> StorageResult<()> {
        self.with_connection(|conn| {
            conn.execute_batch(
                r#"
                -- App state table: key/value settings
                CREATE TABLE IF NOT EXISTS app_state (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                -- Editor snapshots of the query workspace, one row per tab
                CREATE TABLE IF NOT EXISTS workspace_tabs (
                    id TEXT PRIMARY KEY,
                    label TEXT NOT NULL,
                    sql TEXT NOT NULL DEFAULT '',
                    cursor_pos INTEGER NOT NULL DEFAULT 0,
                    sort_order INTEGER NOT NULL DEFAULT 0,
                    is_active INTEGER NOT NULL DEFAULT 0,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_workspace_tabs_sort_order ON workspace_tabs(sort_order);
                "#,
            )
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.connection.lock().map_err(|_| StorageError::Poisoned)
    }

    /// Execute a function with database connection access
    pub fn with_connection<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> SqliteResult<T>,
    {
        let conn = self.lock()?;
        f(&conn).map_err(StorageError::from)
    }

    /// Execute a function with mutable database connection access
    pub fn with_connection_mut<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Connection) -> SqliteResult<T>,
    {
        let mut conn = self.lock()?;
        f(&mut conn).map_err(StorageError::from)
    }
}

/// Default store location in the app data directory
pub fn get_default_db_path() -> StorageResult<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("dev", "pg-workspace", "pg-workspace")
        .ok_or(StorageError::AppDataDir)?;

    Ok(proj_dirs.data_dir().join("workspace.db"))
}

#[cfg(test)]
pub(crate) fn temp_store() -> WorkspaceStore {
    let db_path = std::env::temp_dir().join(format!("pg_workspace_test_{}.db", uuid::Uuid::new_v4()));
    WorkspaceStore::new(db_path).unwrap()
}
