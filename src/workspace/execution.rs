// Query Execution Engine
// Runs SQL for a tab (or the scratch slot) and owns the per-slot result state

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::commands::{self, ExecuteQueryArgs, PG_EXECUTE_QUERY};
use crate::db::query::{QueryReply, QueryResult};
use crate::db::traits::{ManagerError, Origin};
use crate::manager::{ManagerState, PgManager};

/// Where an execution's outcome lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionTarget {
    /// Whichever tab is active when the execution is issued
    ActiveTab,
    Tab(String),
    /// The non-tab slot used for table browsing
    Scratch,
}

/// A result together with the pagination window it was fetched for.
/// Pages are zero-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedResult {
    pub data: QueryResult,
    pub page: u32,
    pub page_size: u32,
}

impl PagedResult {
    /// None unless the backend reported a total
    pub fn total_pages(&self) -> Option<u32> {
        let total = self.data.total_rows?;
        if self.page_size == 0 {
            return None;
        }
        let total = u64::try_from(total).unwrap_or(0);
        let pages = total.div_ceil(u64::from(self.page_size));
        Some(u32::try_from(pages).unwrap_or(u32::MAX))
    }

    pub fn has_next_page(&self) -> bool {
        match self.total_pages() {
            Some(pages) => self.page + 1 < pages,
            None => false,
        }
    }
}

/// Execution state of one tab or of the scratch slot.
///
/// After a completed execution exactly one of `result` / `error` is set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultSlot {
    result: Option<PagedResult>,
    error: Option<String>,
    loading: bool,
    last_sql: Option<String>,
    page_size: u32,
    executed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    issued: u64,
}

impl ResultSlot {
    pub fn result(&self) -> Option<&PagedResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// SQL of the most recent execution, for paging
    pub fn last_sql(&self) -> Option<&str> {
        self.last_sql.as_deref()
    }

    pub fn executed_at(&self) -> Option<DateTime<Utc>> {
        self.executed_at
    }

    /// Start a new execution, clearing the previous outcome. Returns its stamp.
    pub(crate) fn begin(&mut self, sql: &str, page_size: u32) -> u64 {
        self.issued += 1;
        self.result = None;
        self.error = None;
        self.loading = true;
        self.last_sql = Some(sql.to_string());
        self.page_size = page_size;
        self.issued
    }

    pub(crate) fn is_latest(&self, seq: u64) -> bool {
        self.issued == seq
    }

    pub(crate) fn succeed(&mut self, result: PagedResult) {
        self.result = Some(result);
        self.error = None;
        self.loading = false;
        self.executed_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, error: String) {
        self.result = None;
        self.error = Some(error);
        self.loading = false;
        self.executed_at = Some(Utc::now());
    }

    /// Reset to empty and supersede anything in flight
    pub(crate) fn clear(&mut self) {
        *self = ResultSlot {
            issued: self.issued + 1,
            ..ResultSlot::default()
        };
    }
}

/// A target with `ActiveTab` resolved to a concrete tab id
#[derive(Debug, Clone)]
enum SlotKey {
    Tab(String),
    Scratch,
}

impl ManagerState {
    fn resolve(&self, target: &ExecutionTarget) -> Option<SlotKey> {
        match target {
            ExecutionTarget::ActiveTab => Some(SlotKey::Tab(self.workspace.active_tab_id().to_string())),
            ExecutionTarget::Tab(id) => self.workspace.tab(id).map(|t| SlotKey::Tab(t.id().to_string())),
            ExecutionTarget::Scratch => Some(SlotKey::Scratch),
        }
    }

    fn slot_mut(&mut self, key: &SlotKey) -> Option<&mut ResultSlot> {
        match key {
            SlotKey::Tab(id) => self.workspace.tab_mut(id).map(|t| &mut t.slot),
            SlotKey::Scratch => Some(&mut self.scratch),
        }
    }

    fn slot(&self, key: &SlotKey) -> Option<&ResultSlot> {
        match key {
            SlotKey::Tab(id) => self.workspace.tab(id).map(|t| t.slot()),
            SlotKey::Scratch => Some(&self.scratch),
        }
    }
}

const INTERRUPTED: &str = "Execution interrupted before a result arrived";

fn interrupt(state: &mut ManagerState, key: &SlotKey, seq: u64) {
    if let Some(slot) = state.slot_mut(key) {
        if slot.is_latest(seq) {
            slot.fail(INTERRUPTED.to_string());
        }
    }
}

/// Armed while an execution is in flight. Dropping it armed (the `execute`
/// future was cancelled, or the dispatcher panicked) settles the slot with an
/// error so it never stays loading.
struct InFlight {
    state: Arc<RwLock<ManagerState>>,
    key: SlotKey,
    seq: u64,
    armed: bool,
}

impl InFlight {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::debug!(slot = ?self.key, seq = self.seq, "execution interrupted");
        if let Ok(mut state) = self.state.try_write() {
            interrupt(&mut state, &self.key, self.seq);
            return;
        }
        // lock is contended; settle it from a task instead
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let state = Arc::clone(&self.state);
            let key = self.key.clone();
            let seq = self.seq;
            handle.spawn(async move {
                interrupt(&mut *state.write().await, &key, seq);
            });
        }
    }
}

impl PgManager {
    /// Run `sql` against the active connection and store the outcome in the
    /// target's slot. `page_size` of None uses the configured default.
    ///
    /// Failures land in the slot's `error`, never in the return path. A guard
    /// no-op (no active connection, unknown tab) leaves every slot untouched.
    /// If this future is dropped before completing, the slot is settled with
    /// an "interrupted" error.
    pub async fn execute(
        &self,
        target: ExecutionTarget,
        sql: &str,
        page: u32,
        page_size: Option<u32>,
    ) {
        let (ticket, key, seq, page_size) = {
            let mut state = self.state.write().await;
            let Some(ticket) = state.session.ticket() else {
                tracing::debug!("execute ignored, no active connection");
                return;
            };
            let Some(key) = state.resolve(&target) else {
                tracing::debug!(?target, "execute ignored, no such tab");
                return;
            };
            let page_size = page_size.unwrap_or(state.settings.default_page_size);
            let Some(slot) = state.slot_mut(&key) else {
                return;
            };
            let seq = slot.begin(sql, page_size);
            (ticket, key, seq, page_size)
        };
        let in_flight = InFlight {
            state: Arc::clone(&self.state),
            key: key.clone(),
            seq,
            armed: true,
        };

        tracing::debug!(connection_id = %ticket.connection_id, slot = ?key, seq, page, "executing");
        let outcome: Result<QueryReply, ManagerError> = commands::invoke(
            self.dispatcher(),
            Origin::Statement,
            PG_EXECUTE_QUERY,
            &ExecuteQueryArgs {
                id: &ticket.connection_id,
                sql,
                page,
                page_size,
            },
        )
        .await;

        let mut state = self.state.write().await;
        // no await past this point, so the outcome below always lands
        in_flight.disarm();
        let connection_current = state.session.is_current(&ticket);
        let Some(slot) = state.slot_mut(&key) else {
            tracing::debug!(slot = ?key, "tab closed while executing, result dropped");
            return;
        };
        if !slot.is_latest(seq) {
            tracing::debug!(slot = ?key, seq, "superseded execution, result dropped");
            return;
        }
        if !connection_current {
            tracing::info!(connection_id = %ticket.connection_id, slot = ?key, "result discarded, connection no longer active");
            slot.fail(format!(
                "Result discarded: connection {} is no longer active",
                ticket.connection_id
            ));
            return;
        }

        match outcome {
            Ok(reply) => {
                let data = reply.into_result(sql);
                tracing::debug!(slot = ?key, rows = data.rows.len(), duration_ms = data.duration_ms, "execution finished");
                slot.succeed(PagedResult { data, page, page_size });
            }
            Err(e) => {
                tracing::debug!(slot = ?key, error = %e, "execution failed");
                slot.fail(e.message().to_string());
            }
        }
    }

    /// Re-run the slot's last SQL at another page with the same page size.
    /// No-op if the slot has never executed.
    pub async fn execute_page(&self, target: ExecutionTarget, page: u32) {
        let request = {
            let state = self.state.read().await;
            state.resolve(&target).and_then(|key| {
                let slot = state.slot(&key)?;
                let sql = slot.last_sql()?.to_string();
                let target = match key {
                    SlotKey::Tab(id) => ExecutionTarget::Tab(id),
                    SlotKey::Scratch => ExecutionTarget::Scratch,
                };
                Some((target, sql, slot.page_size))
            })
        };

        if let Some((target, sql, page_size)) = request {
            self.execute(target, &sql, page, Some(page_size)).await;
        }
    }

    /// Run the active tab's editor contents from the first page
    pub async fn run_active_tab(&self) {
        let (id, sql) = {
            let state = self.state.read().await;
            let tab = state.workspace.active_tab();
            (tab.id().to_string(), tab.sql().to_string())
        };
        self.execute(ExecutionTarget::Tab(id), &sql, 0, None).await;
    }

    pub async fn scratch(&self) -> ResultSlot {
        self.state.read().await.scratch.clone()
    }
}
