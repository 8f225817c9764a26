// Local persistence for workspace state
// Settings and tab snapshots; connection profiles and secrets live in the backend

pub mod database;
pub mod state;
pub mod tabs;

pub use database::{get_default_db_path, StorageError, StorageResult, WorkspaceStore};
pub use state::WorkspaceSettings;
pub use tabs::TabSnapshot;
