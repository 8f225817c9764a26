// Database session & query workspace manager.
//
// `PgManager` owns connection profiles, session lifecycle, the schema cache and
// a multi-tab SQL workspace. Every backend interaction goes through a
// `CommandDispatcher`, so the same manager runs against an IPC bridge, an
// in-process service or a test double.

pub mod commands;
pub mod db;
pub mod export;
pub mod manager;
pub mod storage;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use db::{
    CellValue, ColumnDefinition, ColumnInfo, ColumnMeta, CommandDispatcher, ConnectionProfile,
    ConnectionStatus, DispatchError, DropOptions, ErrorKind, FunctionInfo, HistoryEntry,
    IndexInfo, ManagerError, NewColumn, ObjectKind, QueryResult, QueryType, SaveConnectionParams,
    SavedQuery, SchemaCache, SessionState, SslMode, TableInfo, TestConnectionParams, ViewInfo,
};
pub use export::ExportFormat;
pub use manager::PgManager;
pub use storage::{get_default_db_path, StorageError, StorageResult, WorkspaceSettings, WorkspaceStore};
pub use workspace::{ExecutionTarget, PagedResult, QueryTab, ResultSlot, Workspace, MAX_TABS};

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`).
/// Returns false if a global subscriber was already set.
pub fn init_tracing() -> bool {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
