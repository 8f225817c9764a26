// History & Library Store
// Execution history and saved queries, both read through from the backend

use serde::{Deserialize, Serialize};

use crate::commands::{
    self, HistoryArgs, IdArgs, SaveQueryArgs, SavedQueriesArgs, PG_DELETE_SAVED_QUERY,
    PG_LIST_QUERY_HISTORY, PG_LIST_SAVED_QUERIES, PG_SAVE_QUERY,
};
use crate::db::traits::{ManagerError, Origin};
use crate::manager::PgManager;

/// One executed statement. Written by the backend, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub connection_id: String,
    pub sql_text: String,
    pub executed_at: String,
    pub duration_ms: Option<i64>,
    pub row_count: Option<i64>,
    pub error: Option<String>,
}

impl HistoryEntry {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// A user-named snippet; `connection_id` of None means global
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedQuery {
    pub id: String,
    pub connection_id: Option<String>,
    pub label: String,
    pub sql_text: String,
    pub created_at: String,
}

/// Last known backend truth for the current scope
#[derive(Debug, Clone, Default, Serialize)]
pub struct Library {
    pub history: Vec<HistoryEntry>,
    pub saved_queries: Vec<SavedQuery>,
    #[serde(skip)]
    history_seq: u64,
    #[serde(skip)]
    saved_seq: u64,
}

impl Library {
    /// Empty both lists and supersede any refresh in flight
    pub(crate) fn clear(&mut self) {
        self.history.clear();
        self.saved_queries.clear();
        self.history_seq += 1;
        self.saved_seq += 1;
    }
}

impl PgManager {
    /// Refresh history for the active connection. No-op without one.
    pub async fn load_history(&self) -> Result<(), ManagerError> {
        let (ticket, seq, limit) = {
            let mut state = self.state.write().await;
            let Some(ticket) = state.session.ticket() else {
                return Ok(());
            };
            state.library.history_seq += 1;
            (ticket, state.library.history_seq, state.settings.history_limit)
        };

        let entries: Vec<HistoryEntry> = commands::invoke(
            self.dispatcher(),
            Origin::Catalog,
            PG_LIST_QUERY_HISTORY,
            &HistoryArgs { connection_id: &ticket.connection_id, limit },
        )
        .await?;

        let mut state = self.state.write().await;
        if state.session.is_current(&ticket) && state.library.history_seq == seq {
            state.library.history = entries;
        } else {
            tracing::debug!(connection_id = %ticket.connection_id, "discarding stale history");
        }
        Ok(())
    }

    /// Refresh saved queries for the active connection, or the global
    /// library when nothing is active.
    pub async fn load_saved_queries(&self) -> Result<(), ManagerError> {
        let (scope, epoch, seq) = {
            let mut state = self.state.write().await;
            state.library.saved_seq += 1;
            (
                state.session.active_connection_id().map(str::to_string),
                state.session.epoch(),
                state.library.saved_seq,
            )
        };

        let queries: Vec<SavedQuery> = commands::invoke(
            self.dispatcher(),
            Origin::Catalog,
            PG_LIST_SAVED_QUERIES,
            &SavedQueriesArgs { connection_id: scope.as_deref() },
        )
        .await?;

        let mut state = self.state.write().await;
        if state.session.epoch() == epoch && state.library.saved_seq == seq {
            state.library.saved_queries = queries;
        } else {
            tracing::debug!(scope = ?scope, "discarding stale saved queries");
        }
        Ok(())
    }

    /// Save under the active connection (global if none), then reload
    pub async fn save_query(&self, label: &str, sql_text: &str) -> Result<SavedQuery, ManagerError> {
        let scope = self.active_connection_id().await;
        let saved: SavedQuery = commands::invoke(
            self.dispatcher(),
            Origin::Catalog,
            PG_SAVE_QUERY,
            &SaveQueryArgs { connection_id: scope.as_deref(), label, sql_text },
        )
        .await?;

        tracing::info!(query_id = %saved.id, "query saved");
        self.load_saved_queries().await?;
        Ok(saved)
    }

    pub async fn delete_saved_query(&self, id: &str) -> Result<(), ManagerError> {
        commands::invoke_unit(
            self.dispatcher(),
            Origin::Catalog,
            PG_DELETE_SAVED_QUERY,
            &IdArgs { id },
        )
        .await?;
        self.load_saved_queries().await
    }

    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.state.read().await.library.history.clone()
    }

    pub async fn saved_queries(&self) -> Vec<SavedQuery> {
        self.state.read().await.library.saved_queries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::WorkspaceSettings;
    use crate::test_helpers::{connect, MockDispatcher};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn history_json(id: &str, connection_id: &str, error: Option<&str>) -> Value {
        json!({
            "id": id,
            "connection_id": connection_id,
            "sql_text": "SELECT 1",
            "executed_at": "2024-05-01 10:00:00",
            "duration_ms": 4,
            "row_count": 1,
            "error": error
        })
    }

    fn saved_json(id: &str, connection_id: Option<&str>, label: &str) -> Value {
        json!({
            "id": id,
            "connection_id": connection_id,
            "label": label,
            "sql_text": "SELECT now()",
            "created_at": "2024-05-01 10:00:00"
        })
    }

    #[tokio::test]
    async fn test_history_requires_active_connection() {
        let mock = MockDispatcher::new();
        let manager = PgManager::new(mock.clone());

        manager.load_history().await.unwrap();
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_history_uses_configured_limit() {
        let mock = MockDispatcher::new();
        let settings = WorkspaceSettings {
            history_limit: 20,
            ..WorkspaceSettings::default()
        };
        let manager = PgManager::with_settings(mock.clone(), settings);
        connect(&manager, &mock, "a").await;

        mock.respond(
            PG_LIST_QUERY_HISTORY,
            json!([history_json("h1", "a", None), history_json("h2", "a", Some("boom"))]),
        );
        manager.load_history().await.unwrap();

        assert_eq!(
            mock.calls_to(PG_LIST_QUERY_HISTORY),
            vec![json!({"connectionId": "a", "limit": 20})]
        );
        let history = manager.history().await;
        assert_eq!(history.len(), 2);
        assert!(history[1].failed());
    }

    #[tokio::test]
    async fn test_history_for_previous_connection_is_discarded() {
        let mock = MockDispatcher::new();
        let manager = Arc::new(PgManager::new(mock.clone()));
        connect(&manager, &mock, "a").await;

        let release = mock.respond_gated(
            PG_LIST_QUERY_HISTORY,
            "connectionId",
            json!("a"),
            json!([history_json("h1", "a", None)]),
        );
        let pending = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.load_history().await })
        };
        mock.wait_for_calls(PG_LIST_QUERY_HISTORY, 1).await;

        connect(&manager, &mock, "b").await;
        release.send(()).unwrap();
        pending.await.unwrap().unwrap();

        assert!(manager.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_query_reloads_library() {
        let mock = MockDispatcher::new();
        let manager = PgManager::new(mock.clone());
        connect(&manager, &mock, "a").await;

        mock.respond(PG_SAVE_QUERY, saved_json("q1", Some("a"), "recent orders"));
        mock.respond(
            PG_LIST_SAVED_QUERIES,
            json!([saved_json("q1", Some("a"), "recent orders")]),
        );
        let saved = manager.save_query("recent orders", "SELECT now()").await.unwrap();

        assert_eq!(saved.id, "q1");
        assert_eq!(
            mock.calls_to(PG_SAVE_QUERY),
            vec![json!({"connectionId": "a", "label": "recent orders", "sqlText": "SELECT now()"})]
        );
        assert_eq!(manager.saved_queries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_saved_query_reloads_library() {
        let mock = MockDispatcher::new();
        let manager = PgManager::new(mock.clone());

        mock.respond(
            PG_LIST_SAVED_QUERIES,
            json!([saved_json("q1", None, "one"), saved_json("q2", None, "two")]),
        );
        manager.load_saved_queries().await.unwrap();
        assert_eq!(manager.saved_queries().await.len(), 2);

        mock.respond(PG_DELETE_SAVED_QUERY, json!(null));
        mock.respond(PG_LIST_SAVED_QUERIES, json!([saved_json("q2", None, "two")]));
        manager.delete_saved_query("q1").await.unwrap();

        let saved = manager.saved_queries().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, "q2");
        assert_eq!(
            mock.calls_to(PG_LIST_SAVED_QUERIES)[0],
            json!({"connectionId": null})
        );
    }

    #[tokio::test]
    async fn test_switching_connection_clears_library() {
        let mock = MockDispatcher::new();
        let manager = PgManager::new(mock.clone());
        connect(&manager, &mock, "a").await;
        mock.respond(PG_LIST_QUERY_HISTORY, json!([history_json("h1", "a", None)]));
        manager.load_history().await.unwrap();

        connect(&manager, &mock, "b").await;

        assert!(manager.history().await.is_empty());
        assert!(manager.saved_queries().await.is_empty());
    }
}
