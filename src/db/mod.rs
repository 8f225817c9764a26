// Database Module
// Connection registry, session lifecycle, schema cache, library and DDL,
// all reached through the command dispatch boundary

pub mod connection;
pub mod ddl;
pub mod history;
pub mod query;
pub mod schema;
pub mod session;
pub mod traits;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{ConnectionProfile, SaveConnectionParams, SslMode, TestConnectionParams};
pub use ddl::{ColumnDefinition, DropOptions, NewColumn, ObjectKind};
pub use history::{HistoryEntry, Library, SavedQuery};
pub use query::{CellValue, ColumnMeta, QueryResult, QueryType};
pub use schema::{ColumnInfo, FunctionInfo, IndexInfo, SchemaCache, TableInfo, ViewInfo};
pub use session::{ConnectionStatus, SessionState};
pub use traits::{CommandDispatcher, DispatchError, ErrorKind, ManagerError};
