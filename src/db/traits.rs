// Command Dispatch Boundary
// Defines the single abstraction through which the manager reaches the database-command service

use serde::{Deserialize, Serialize};

/// Failure reported by a dispatcher
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The backend ran the command and failed it
    #[error("{0}")]
    Rejected(String),

    /// The backend could not be reached at all
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Request/response boundary keyed by command name plus a structured payload.
///
/// Implementations forward to whatever actually runs the `pg_*` commands (an IPC
/// bridge, an in-process service, a test double). Every call may suspend.
#[async_trait::async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn invoke(
        &self,
        command: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, DispatchError>;
}

/// Closed set of error kinds callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connectivity,
    Auth,
    Guard,
    Execution,
    Backend,
}

/// Common manager error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManagerError {
    #[error("Connection failed: {0}")]
    Connectivity(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Precondition not met: {0}")]
    Guard(String),

    #[error("Query execution error: {0}")]
    Execution(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl ManagerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ManagerError::Connectivity(_) => ErrorKind::Connectivity,
            ManagerError::Auth(_) => ErrorKind::Auth,
            ManagerError::Guard(_) => ErrorKind::Guard,
            ManagerError::Execution(_) => ErrorKind::Execution,
            ManagerError::Backend(_) => ErrorKind::Backend,
        }
    }

    /// The bare message without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            ManagerError::Connectivity(m)
            | ManagerError::Auth(m)
            | ManagerError::Guard(m)
            | ManagerError::Execution(m)
            | ManagerError::Backend(m) => m,
        }
    }

    /// Map a dispatcher failure to a kind, based on where the call came from
    pub(crate) fn from_dispatch(origin: Origin, err: DispatchError) -> Self {
        match err {
            DispatchError::Unavailable(msg) => ManagerError::Backend(msg),
            DispatchError::Rejected(msg) => origin.classify(msg),
        }
    }
}

/// Which family of command produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// connect / test
    Session,
    /// execute, DDL, export, row counts
    Statement,
    /// schema loaders, registry, history and library
    Catalog,
}

const AUTH_MARKERS: &[&str] = &[
    "password authentication failed",
    "authentication",
    "permission denied",
    "no pg_hba.conf entry",
];

const SESSION_GONE_MARKERS: &[&str] = &["not connected", "no active connection", "pool error"];

impl Origin {
    fn classify(self, msg: String) -> ManagerError {
        let lower = msg.to_lowercase();
        let session_gone = SESSION_GONE_MARKERS.iter().any(|m| lower.contains(m));
        match self {
            Origin::Session => {
                let is_auth = AUTH_MARKERS.iter().any(|m| lower.contains(m))
                    || (lower.contains("role") && lower.contains("does not exist"));
                if is_auth {
                    ManagerError::Auth(msg)
                } else {
                    ManagerError::Connectivity(msg)
                }
            }
            Origin::Statement if session_gone => ManagerError::Connectivity(msg),
            Origin::Statement => ManagerError::Execution(msg),
            Origin::Catalog if session_gone => ManagerError::Connectivity(msg),
            Origin::Catalog => ManagerError::Backend(msg),
        }
    }
}
