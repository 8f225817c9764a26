// Session Controller
// Tracks which profiles have live backend sessions and which one is active

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::commands::{self, IdArgs, PG_CONNECT, PG_DISCONNECT};
use crate::db::traits::{ManagerError, Origin};
use crate::manager::PgManager;

/// Lifecycle of one profile as seen by the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    /// Connected, but not the one driving schema browsing
    Background,
    Active,
}

/// Active pointer plus connected set.
///
/// `active`, if set, is always a member of `connected`. `epoch` advances on
/// every change of the active pointer; requests capture it at dispatch time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionState {
    active: Option<String>,
    connected: BTreeSet<String>,
    connecting: BTreeSet<String>,
    #[serde(skip)]
    epoch: u64,
    #[serde(skip)]
    activation_seq: u64,
    /// Bumped per id on every teardown; a connect issued under an older
    /// generation has been withdrawn
    #[serde(skip)]
    generations: BTreeMap<String, u64>,
}

/// What `begin_connect` captured
#[derive(Debug, Clone, Copy)]
struct ConnectStamp {
    activation: u64,
    generation: u64,
}

/// The connection context a request was issued under
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionTicket {
    pub(crate) connection_id: String,
    pub(crate) epoch: u64,
}

impl SessionState {
    pub fn active_connection_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn connected_ids(&self) -> &BTreeSet<String> {
        &self.connected
    }

    pub fn is_connected(&self, id: &str) -> bool {
        self.connected.contains(id)
    }

    pub fn status(&self, id: &str) -> ConnectionStatus {
        if self.active.as_deref() == Some(id) {
            ConnectionStatus::Active
        } else if self.connected.contains(id) {
            ConnectionStatus::Background
        } else if self.connecting.contains(id) {
            ConnectionStatus::Connecting
        } else {
            ConnectionStatus::Disconnected
        }
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn ticket(&self) -> Option<SessionTicket> {
        self.active.as_ref().map(|id| SessionTicket {
            connection_id: id.clone(),
            epoch: self.epoch,
        })
    }

    pub(crate) fn is_current(&self, ticket: &SessionTicket) -> bool {
        self.epoch == ticket.epoch && self.active.as_deref() == Some(ticket.connection_id.as_str())
    }

    /// Only called through `ManagerState::transition_active`
    pub(crate) fn set_active(&mut self, next: Option<String>) {
        if let Some(id) = &next {
            self.connected.insert(id.clone());
        }
        self.active = next;
        self.epoch += 1;
    }

    fn begin_connect(&mut self, id: &str) -> ConnectStamp {
        self.connecting.insert(id.to_string());
        self.activation_seq += 1;
        ConnectStamp {
            activation: self.activation_seq,
            generation: self.generation(id),
        }
    }

    fn generation(&self, id: &str) -> u64 {
        self.generations.get(id).copied().unwrap_or(0)
    }

    fn is_withdrawn(&self, id: &str, stamp: ConnectStamp) -> bool {
        self.generation(id) != stamp.generation
    }

    fn next_activation(&mut self) -> u64 {
        self.activation_seq += 1;
        self.activation_seq
    }

    fn is_latest_activation(&self, seq: u64) -> bool {
        self.activation_seq == seq
    }

    /// Drop `id` from the connected set and withdraw any connect in flight
    /// for it; true if it was the active one
    pub(crate) fn remove(&mut self, id: &str) -> bool {
        self.connected.remove(id);
        self.connecting.remove(id);
        *self.generations.entry(id.to_string()).or_insert(0) += 1;
        self.active.as_deref() == Some(id)
    }
}

impl PgManager {
    /// Open a backend session for `id` and make it the active connection.
    ///
    /// On failure nothing changes and the error is returned; it is not
    /// retried. If a newer connect or activate was requested while this one
    /// was in flight and another session is now active, this one stays
    /// connected in the background instead. If `id` was disconnected or
    /// deleted while the request was in flight, the new session is closed
    /// again and local state is left alone.
    ///
    /// `id` is not checked against the loaded profiles; an unknown id stays
    /// active until the next `load_connections` drops it.
    #[tracing::instrument(skip(self), fields(connection_id = %id))]
    pub async fn connect(&self, id: &str) -> Result<(), ManagerError> {
        let stamp = self.state.write().await.session.begin_connect(id);

        let outcome: Result<String, ManagerError> =
            commands::invoke(self.dispatcher(), Origin::Session, PG_CONNECT, &IdArgs { id }).await;

        let activated = {
            let mut state = self.state.write().await;
            if state.session.is_withdrawn(id, stamp) {
                // a later connect for the same id owns the backend session now
                let reopened = state.session.is_connected(id) || state.session.connecting.contains(id);
                drop(state);
                if outcome.is_ok() && !reopened {
                    tracing::debug!("connection closed while connecting, dropping new session");
                    if let Err(e) = commands::invoke_unit(
                        self.dispatcher(),
                        Origin::Session,
                        PG_DISCONNECT,
                        &IdArgs { id },
                    )
                    .await
                    {
                        tracing::warn!(error = %e, "could not close withdrawn session");
                    }
                }
                return Ok(());
            }

            state.session.connecting.remove(id);
            if let Err(e) = outcome {
                tracing::warn!(error = %e, "connect failed");
                return Err(e);
            }

            // a newer request that failed leaves nothing active, so take over
            if state.session.is_latest_activation(stamp.activation) || state.session.active.is_none() {
                state.transition_active(Some(id.to_string()));
                true
            } else {
                state.session.connected.insert(id.to_string());
                false
            }
        };

        if !activated {
            tracing::info!("connected in background, a newer activation superseded this one");
            return Ok(());
        }

        tracing::info!("connection active");
        self.load_schemas().await
    }

    /// Tear down the backend session for `id`. Teardown is best-effort: a
    /// backend failure is logged and the local transition happens anyway.
    #[tracing::instrument(skip(self), fields(connection_id = %id))]
    pub async fn disconnect(&self, id: &str) {
        if let Err(e) =
            commands::invoke_unit(self.dispatcher(), Origin::Session, PG_DISCONNECT, &IdArgs { id })
                .await
        {
            tracing::warn!(error = %e, "disconnect not acknowledged, dropping session anyway");
        }

        let mut state = self.state.write().await;
        if state.session.remove(id) {
            state.transition_active(None);
            tracing::info!("active connection closed, schema cache cleared");
        } else {
            tracing::info!("background connection closed");
        }
    }

    /// Switch the active pointer to an already-connected profile and reload
    /// its schemas, with the same invalidate-then-reload sequence as `connect`.
    #[tracing::instrument(skip(self), fields(connection_id = %id))]
    pub async fn activate(&self, id: &str) -> Result<(), ManagerError> {
        {
            let mut state = self.state.write().await;
            if !state.session.is_connected(id) {
                return Err(ManagerError::Guard(format!("connection {id} is not connected")));
            }
            if state.session.active_connection_id() == Some(id) {
                return Ok(());
            }
            state.session.next_activation();
            state.transition_active(Some(id.to_string()));
        }

        tracing::info!("connection active");
        self.load_schemas().await
    }

    pub async fn session(&self) -> SessionState {
        self.state.read().await.session.clone()
    }

    pub async fn active_connection_id(&self) -> Option<String> {
        self.state.read().await.session.active.clone()
    }

    pub async fn connection_status(&self, id: &str) -> ConnectionStatus {
        self.state.read().await.session.status(id)
    }
}
