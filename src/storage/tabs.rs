// Workspace tab snapshots
// Editor state only (label, SQL, cursor); results never reach disk

use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::database::{StorageResult, WorkspaceStore};

/// Persisted editor state of one tab. Order is the slice order on save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub id: String,
    pub label: String,
    pub sql: String,
    pub cursor_pos: u32,
    pub is_active: bool,
}

impl WorkspaceStore {
    /// Replace every stored snapshot with `tabs`
    pub fn save_tab_snapshots(&self, tabs: &[TabSnapshot]) -> StorageResult<()> {
        self.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM workspace_tabs", [])?;
            {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO workspace_tabs (id, label, sql, cursor_pos, sort_order, is_active, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
                    "#,
                )?;
                for (index, tab) in tabs.iter().enumerate() {
                    stmt.execute(params![
                        tab.id,
                        tab.label,
                        tab.sql,
                        tab.cursor_pos,
                        index as i64,
                        tab.is_active as i32
                    ])?;
                }
            }
            tx.commit()
        })?;

        tracing::debug!(count = tabs.len(), "workspace tabs saved");
        Ok(())
    }

    /// Stored snapshots in tab order
    pub fn load_tab_snapshots(&self) -> StorageResult<Vec<TabSnapshot>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, label, sql, cursor_pos, is_active FROM workspace_tabs ORDER BY sort_order",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(TabSnapshot {
                    id: row.get(0)?,
                    label: row.get(1)?,
                    sql: row.get(2)?,
                    cursor_pos: row.get(3)?,
                    is_active: row.get::<_, i32>(4)? != 0,
                })
            })?;
            rows.collect()
        })
    }
}
