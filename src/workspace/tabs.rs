// Query Workspace
// A bounded, ordered set of editor tabs with exactly one active tab

use serde::Serialize;
use uuid::Uuid;

use super::execution::{PagedResult, ResultSlot};
use crate::manager::PgManager;
use crate::storage::{StorageResult, TabSnapshot, WorkspaceStore};

/// Upper bound on open tabs
pub const MAX_TABS: usize = 10;

/// One isolated SQL editing and execution context
#[derive(Debug, Clone, Serialize)]
pub struct QueryTab {
    id: String,
    label: String,
    sql: String,
    cursor_pos: u32,
    #[serde(flatten)]
    pub(crate) slot: ResultSlot,
}

impl QueryTab {
    fn new(label: String, sql: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            label,
            cursor_pos: 0,
            sql,
            slot: ResultSlot::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn cursor_pos(&self) -> u32 {
        self.cursor_pos
    }

    pub fn slot(&self) -> &ResultSlot {
        &self.slot
    }

    pub fn result(&self) -> Option<&PagedResult> {
        self.slot.result()
    }

    pub fn error(&self) -> Option<&str> {
        self.slot.error()
    }

    pub fn is_loading(&self) -> bool {
        self.slot.is_loading()
    }
}

/// Tabs in display order.
///
/// Never empty, never more than `MAX_TABS`, and `active_tab_id` always names
/// one of `tabs`. Every mutation that would break this is a no-op.
#[derive(Debug, Clone, Serialize)]
pub struct Workspace {
    tabs: Vec<QueryTab>,
    active_tab_id: String,
    #[serde(skip)]
    next_label: u32,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    /// A workspace with a single empty "Query 1" tab
    pub fn new() -> Self {
        let first = QueryTab::new("Query 1".to_string(), String::new());
        Self {
            active_tab_id: first.id.clone(),
            tabs: vec![first],
            next_label: 2,
        }
    }

    pub fn tabs(&self) -> &[QueryTab] {
        &self.tabs
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_full(&self) -> bool {
        self.tabs.len() >= MAX_TABS
    }

    pub fn active_tab_id(&self) -> &str {
        &self.active_tab_id
    }

    pub fn active_tab(&self) -> &QueryTab {
        self.tab(&self.active_tab_id).unwrap_or(&self.tabs[0])
    }

    pub fn tab(&self, id: &str) -> Option<&QueryTab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    pub(crate) fn tab_mut(&mut self, id: &str) -> Option<&mut QueryTab> {
        self.tabs.iter_mut().find(|t| t.id == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tabs.iter().position(|t| t.id == id)
    }

    /// Append a tab and make it active. None when at capacity.
    pub fn create_tab(&mut self, label: Option<&str>, sql: Option<&str>) -> Option<String> {
        if self.is_full() {
            return None;
        }

        let label = match label {
            Some(label) => label.to_string(),
            None => format!("Query {}", self.next_label),
        };
        self.next_label += 1;

        let tab = QueryTab::new(label, sql.unwrap_or_default().to_string());
        let id = tab.id.clone();
        self.tabs.push(tab);
        self.active_tab_id = id.clone();
        Some(id)
    }

    /// Remove a tab. Closing the active tab selects the tab that slides into
    /// its position, or the new last tab if it was final.
    pub fn close_tab(&mut self, id: &str) -> bool {
        if self.tabs.len() <= 1 {
            return false;
        }
        let Some(index) = self.position(id) else {
            return false;
        };

        self.tabs.remove(index);
        if self.active_tab_id == id {
            let next = index.min(self.tabs.len() - 1);
            self.active_tab_id = self.tabs[next].id.clone();
        }
        true
    }

    pub fn set_active_tab(&mut self, id: &str) -> bool {
        if self.position(id).is_none() {
            return false;
        }
        self.active_tab_id = id.to_string();
        true
    }

    pub fn rename_tab(&mut self, id: &str, label: &str) -> bool {
        match self.tab_mut(id) {
            Some(tab) => {
                tab.label = label.to_string();
                true
            }
            None => false,
        }
    }

    /// Editor change; leaves the tab's execution state alone
    pub fn update_tab_sql(&mut self, id: &str, sql: &str, cursor_pos: u32) -> bool {
        match self.tab_mut(id) {
            Some(tab) => {
                tab.sql = sql.to_string();
                tab.cursor_pos = cursor_pos;
                true
            }
            None => false,
        }
    }

    /// Reorder; `to_index` past the end moves the tab last
    pub fn move_tab(&mut self, id: &str, to_index: usize) -> bool {
        let Some(from) = self.position(id) else {
            return false;
        };
        let tab = self.tabs.remove(from);
        let to = to_index.min(self.tabs.len());
        self.tabs.insert(to, tab);
        true
    }

    pub fn snapshots(&self) -> Vec<TabSnapshot> {
        self.tabs
            .iter()
            .map(|t| TabSnapshot {
                id: t.id.clone(),
                label: t.label.clone(),
                sql: t.sql.clone(),
                cursor_pos: t.cursor_pos,
                is_active: t.id == self.active_tab_id,
            })
            .collect()
    }

    /// Rebuild from snapshots, keeping at most `MAX_TABS` with unique ids.
    /// None if nothing usable remains.
    pub fn from_snapshots(snapshots: Vec<TabSnapshot>) -> Option<Self> {
        let mut tabs: Vec<QueryTab> = Vec::new();
        let mut active = None;
        for snap in snapshots {
            if tabs.len() == MAX_TABS {
                break;
            }
            if snap.id.is_empty() || tabs.iter().any(|t| t.id == snap.id) {
                continue;
            }
            if snap.is_active && active.is_none() {
                active = Some(snap.id.clone());
            }
            tabs.push(QueryTab {
                id: snap.id,
                label: snap.label,
                sql: snap.sql,
                cursor_pos: snap.cursor_pos,
                slot: ResultSlot::default(),
            });
        }

        let first = tabs.first()?.id.clone();
        let next_label = u32::try_from(tabs.len()).unwrap_or(0) + 1;
        Some(Self {
            active_tab_id: active.unwrap_or(first),
            tabs,
            next_label,
        })
    }
}

impl PgManager {
    pub async fn create_tab(&self, label: Option<&str>, sql: Option<&str>) -> Option<String> {
        let id = self.state.write().await.workspace.create_tab(label, sql);
        match &id {
            Some(id) => tracing::debug!(tab_id = %id, "tab created"),
            None => tracing::debug!("tab limit reached, create ignored"),
        }
        id
    }

    pub async fn close_tab(&self, id: &str) -> bool {
        self.state.write().await.workspace.close_tab(id)
    }

    pub async fn set_active_tab(&self, id: &str) -> bool {
        self.state.write().await.workspace.set_active_tab(id)
    }

    pub async fn rename_tab(&self, id: &str, label: &str) -> bool {
        self.state.write().await.workspace.rename_tab(id, label)
    }

    pub async fn update_tab_sql(&self, id: &str, sql: &str, cursor_pos: u32) -> bool {
        self.state
            .write()
            .await
            .workspace
            .update_tab_sql(id, sql, cursor_pos)
    }

    pub async fn move_tab(&self, id: &str, to_index: usize) -> bool {
        self.state.write().await.workspace.move_tab(id, to_index)
    }

    pub async fn workspace(&self) -> Workspace {
        self.state.read().await.workspace.clone()
    }

    pub async fn active_tab(&self) -> QueryTab {
        self.state.read().await.workspace.active_tab().clone()
    }

    pub async fn tab(&self, id: &str) -> Option<QueryTab> {
        self.state.read().await.workspace.tab(id).cloned()
    }

    /// Save editor state of every tab
    pub async fn persist_workspace(&self, store: &WorkspaceStore) -> StorageResult<()> {
        let snapshots = self.state.read().await.workspace.snapshots();
        store.save_tab_snapshots(&snapshots)
    }

    /// Replace the workspace with the stored snapshots. Returns false (and
    /// keeps the current tabs) when restoring is disabled or nothing is stored.
    pub async fn restore_workspace(&self, store: &WorkspaceStore) -> StorageResult<bool> {
        if !self.settings().await.restore_tabs {
            return Ok(false);
        }
        let Some(workspace) = Workspace::from_snapshots(store.load_tab_snapshots()?) else {
            return Ok(false);
        };

        tracing::info!(tabs = workspace.len(), "workspace restored");
        self.state.write().await.workspace = workspace;
        Ok(true)
    }
}
