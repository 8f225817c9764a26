// Session Manager
// Owns all client-side state (registry, session, schema cache, workspace, library)
// and the dispatcher every backend request goes through

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::connection::ConnectionProfile;
use crate::db::history::Library;
use crate::db::schema::SchemaCache;
use crate::db::session::SessionState;
use crate::db::traits::CommandDispatcher;
use crate::storage::WorkspaceSettings;
use crate::workspace::{ResultSlot, Workspace};

/// Everything the manager tracks, guarded by a single lock
#[derive(Debug, Default)]
pub(crate) struct ManagerState {
    pub(crate) connections: Vec<ConnectionProfile>,
    pub(crate) session: SessionState,
    pub(crate) cache: SchemaCache,
    pub(crate) workspace: Workspace,
    /// Result slot for executions not bound to a tab
    pub(crate) scratch: ResultSlot,
    pub(crate) library: Library,
    pub(crate) settings: WorkspaceSettings,
}

impl ManagerState {
    /// Move the active pointer. Everything scoped to the previous active
    /// connection is invalidated before the pointer changes, and the session
    /// epoch advances so responses issued under the old pointer are dropped.
    pub(crate) fn transition_active(&mut self, next: Option<String>) {
        self.cache.invalidate();
        self.library.clear();
        self.scratch.clear();
        self.session.set_active(next);
    }
}

/// Database session & query workspace manager.
///
/// Share it behind an `Arc`; every operation takes `&self` and the state lock
/// is never held while a command is in flight, so operations on different tabs
/// or connections may interleave freely.
pub struct PgManager {
    pub(crate) dispatcher: Arc<dyn CommandDispatcher>,
    pub(crate) state: Arc<RwLock<ManagerState>>,
}

impl PgManager {
    pub fn new(dispatcher: Arc<dyn CommandDispatcher>) -> Self {
        Self::with_settings(dispatcher, WorkspaceSettings::default())
    }

    pub fn with_settings(dispatcher: Arc<dyn CommandDispatcher>, settings: WorkspaceSettings) -> Self {
        Self {
            dispatcher,
            state: Arc::new(RwLock::new(ManagerState {
                settings,
                ..ManagerState::default()
            })),
        }
    }

    pub async fn settings(&self) -> WorkspaceSettings {
        self.state.read().await.settings.clone()
    }

    pub async fn update_settings(&self, settings: WorkspaceSettings) {
        self.state.write().await.settings = settings;
    }

    pub(crate) fn dispatcher(&self) -> &dyn CommandDispatcher {
        self.dispatcher.as_ref()
    }
}
