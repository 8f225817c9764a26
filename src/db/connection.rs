// Connection Registry
// Holds known connection profiles; the backend is authoritative for every field

use serde::{Deserialize, Serialize};

use crate::commands::{
    self, IdArgs, NoArgs, SaveConnectionArgs, TestConnectionArgs, PG_DELETE_CONNECTION,
    PG_LIST_CONNECTIONS, PG_SAVE_CONNECTION, PG_TEST_CONNECTION,
};
use crate::db::traits::{ManagerError, Origin};
use crate::manager::PgManager;

/// PostgreSQL `sslmode`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    Allow,
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

/// A saved connection profile as reported by the backend.
///
/// Carries no password. Passwords are write-only: sent through
/// `SaveConnectionParams` and never read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub id: String,
    pub label: Option<String>,
    pub forward_id: Option<String>,
    pub favorite_id: Option<String>,
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub username: String,
    pub ssl_mode: SslMode,
    pub color: Option<String>,
    pub created_at: String,
    #[serde(rename = "last_used")]
    pub last_used_at: Option<String>,
}

impl ConnectionProfile {
    /// Label if set, database name otherwise
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.database_name)
    }
}

/// Input for creating or updating a profile (upsert by `id`)
#[derive(Debug, Clone, Default)]
pub struct SaveConnectionParams {
    /// Absent means insert; the backend assigns the id
    pub id: Option<String>,
    pub label: Option<String>,
    pub forward_id: Option<String>,
    pub favorite_id: Option<String>,
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub username: String,
    /// Absent on update keeps the stored password
    pub password: Option<String>,
    pub ssl_mode: SslMode,
    pub color: Option<String>,
}

/// Candidate parameters for a side-effect-free connectivity probe
#[derive(Debug, Clone)]
pub struct TestConnectionParams {
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub username: String,
    pub password: String,
}

impl PgManager {
    /// Replace the profile list with the backend's, then drop session state
    /// for any id that no longer exists.
    pub async fn load_connections(&self) -> Result<(), ManagerError> {
        let profiles: Vec<ConnectionProfile> =
            commands::invoke(self.dispatcher(), Origin::Catalog, PG_LIST_CONNECTIONS, &NoArgs {})
                .await?;

        let mut state = self.state.write().await;
        let vanished: Vec<String> = state
            .session
            .connected_ids()
            .iter()
            .filter(|id| !profiles.iter().any(|p| &p.id == *id))
            .cloned()
            .collect();
        for id in vanished {
            tracing::info!(connection_id = %id, "profile no longer exists, dropping its session");
            if state.session.remove(&id) {
                state.transition_active(None);
            }
        }

        tracing::debug!(count = profiles.len(), "connections loaded");
        state.connections = profiles;
        Ok(())
    }

    /// Upsert a profile, then refresh the whole list from the backend
    pub async fn save_connection(
        &self,
        params: &SaveConnectionParams,
    ) -> Result<ConnectionProfile, ManagerError> {
        let args = SaveConnectionArgs {
            id: params.id.as_deref(),
            label: params.label.as_deref(),
            forward_id: params.forward_id.as_deref(),
            favorite_id: params.favorite_id.as_deref(),
            host: &params.host,
            port: params.port,
            database_name: &params.database_name,
            username: &params.username,
            password: params.password.as_deref(),
            ssl_mode: params.ssl_mode,
            color: params.color.as_deref(),
        };
        let saved: ConnectionProfile =
            commands::invoke(self.dispatcher(), Origin::Catalog, PG_SAVE_CONNECTION, &args).await?;

        tracing::info!(connection_id = %saved.id, "connection saved");
        self.load_connections().await?;
        Ok(saved)
    }

    /// Delete a profile. The local removal from the connected set (and, if it
    /// was active, the cache reset) happens even if the backend rejects it.
    pub async fn delete_connection(&self, id: &str) -> Result<(), ManagerError> {
        if let Err(e) = commands::invoke_unit(
            self.dispatcher(),
            Origin::Catalog,
            PG_DELETE_CONNECTION,
            &IdArgs { id },
        )
        .await
        {
            tracing::warn!(connection_id = %id, error = %e, "backend did not delete connection");
        }

        {
            let mut state = self.state.write().await;
            if state.session.remove(id) {
                state.transition_active(None);
            }
            state.connections.retain(|c| c.id != id);
        }

        self.load_connections().await
    }

    /// Probe candidate parameters; touches no registry or session state
    pub async fn test_connection(
        &self,
        params: &TestConnectionParams,
    ) -> Result<String, ManagerError> {
        let args = TestConnectionArgs {
            host: &params.host,
            port: params.port,
            database_name: &params.database_name,
            username: &params.username,
            password: &params.password,
        };
        commands::invoke(self.dispatcher(), Origin::Session, PG_TEST_CONNECTION, &args).await
    }

    pub async fn connections(&self) -> Vec<ConnectionProfile> {
        self.state.read().await.connections.clone()
    }

    pub async fn active_connection(&self) -> Option<ConnectionProfile> {
        let state = self.state.read().await;
        let id = state.session.active_connection_id()?;
        state.connections.iter().find(|c| c.id == id).cloned()
    }

    /// True when there is an active connection with a live session
    pub async fn is_connected(&self) -> bool {
        self.state.read().await.session.ticket().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::PG_LIST_TABLES;
    use crate::db::traits::ErrorKind;
    use crate::test_helpers::{connect, profile_json, table_json, MockDispatcher};
    use serde_json::json;

    #[test]
    fn test_profile_ignores_echoed_password() {
        let mut value = profile_json("c1", "db.internal");
        value["password"] = json!([1, 2, 3]);

        let profile: ConnectionProfile = serde_json::from_value(value).unwrap();
        let round = serde_json::to_value(&profile).unwrap();

        assert!(round.get("password").is_none());
        assert_eq!(round["last_used"], json!(null));
        assert_eq!(profile.display_name(), "app");
    }

    #[tokio::test]
    async fn test_save_then_list_has_no_password() {
        let mock = MockDispatcher::new();
        let mut saved = profile_json("new-id", "db.internal");
        saved["ssl_mode"] = json!("require");
        mock.respond(PG_SAVE_CONNECTION, saved.clone());
        mock.respond(PG_LIST_CONNECTIONS, json!([saved]));
        let manager = PgManager::new(mock.clone());

        let params = SaveConnectionParams {
            host: "db.internal".to_string(),
            port: 5432,
            database_name: "app".to_string(),
            username: "svc".to_string(),
            password: Some("hunter2".to_string()),
            ssl_mode: SslMode::Require,
            ..SaveConnectionParams::default()
        };
        let profile = manager.save_connection(&params).await.unwrap();
        assert_eq!(profile.id, "new-id");

        let sent = &mock.calls_to(PG_SAVE_CONNECTION)[0];
        assert_eq!(sent["id"], json!(null));
        assert_eq!(sent["password"], json!("hunter2"));

        let listed = manager.connections().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].host, "db.internal");
        assert_eq!(listed[0].ssl_mode, SslMode::Require);
        let as_json = serde_json::to_value(&listed[0]).unwrap();
        assert!(as_json.get("password").is_none());
    }

    #[tokio::test]
    async fn test_delete_active_clears_session_even_when_backend_rejects() {
        let mock = MockDispatcher::new();
        let manager = PgManager::new(mock.clone());
        mock.respond(PG_LIST_CONNECTIONS, json!([profile_json("a", "h1")]));
        manager.load_connections().await.unwrap();
        connect(&manager, &mock, "a").await;
        mock.respond(PG_LIST_TABLES, json!([table_json("public", "users")]));
        manager.load_tables("public").await.unwrap();

        mock.fail(PG_DELETE_CONNECTION, "no such connection");
        mock.respond(PG_LIST_CONNECTIONS, json!([]));
        manager.delete_connection("a").await.unwrap();

        let session = manager.session().await;
        assert_eq!(session.active_connection_id(), None);
        assert!(!session.is_connected("a"));
        assert!(manager.schema_cache().await.is_empty());
        assert!(manager.connections().await.is_empty());
    }

    #[tokio::test]
    async fn test_reload_drops_sessions_for_vanished_profiles() {
        let mock = MockDispatcher::new();
        let manager = PgManager::new(mock.clone());
        connect(&manager, &mock, "a").await;
        connect(&manager, &mock, "b").await;

        mock.respond(PG_LIST_CONNECTIONS, json!([profile_json("a", "h1")]));
        manager.load_connections().await.unwrap();

        let session = manager.session().await;
        assert!(session.is_connected("a"));
        assert!(!session.is_connected("b"));
        assert_eq!(session.active_connection_id(), None);
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_active_connection_resolves_profile() {
        let mock = MockDispatcher::new();
        let manager = PgManager::new(mock.clone());
        mock.respond(
            PG_LIST_CONNECTIONS,
            json!([profile_json("a", "h1"), profile_json("b", "h2")]),
        );
        manager.load_connections().await.unwrap();
        assert!(manager.active_connection().await.is_none());

        connect(&manager, &mock, "b").await;
        let active = manager.active_connection().await.unwrap();
        assert_eq!(active.host, "h2");
    }

    #[tokio::test]
    async fn test_connection_probe_has_no_side_effects() {
        let mock = MockDispatcher::new();
        let manager = PgManager::new(mock.clone());
        mock.respond(
            PG_TEST_CONNECTION,
            json!("Successfully connected to app@db.internal:5432 as svc"),
        );

        let params = TestConnectionParams {
            host: "db.internal".to_string(),
            port: 5432,
            database_name: "app".to_string(),
            username: "svc".to_string(),
            password: "pw".to_string(),
        };
        let message = manager.test_connection(&params).await.unwrap();
        assert!(message.starts_with("Successfully connected"));
        assert!(manager.session().await.connected_ids().is_empty());
        assert!(manager.connections().await.is_empty());

        mock.fail(PG_TEST_CONNECTION, "Connection failed: connection refused");
        let err = manager.test_connection(&params).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
    }
}
