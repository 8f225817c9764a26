// Test doubles for the command dispatch boundary

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::commands::{PG_CONNECT, PG_LIST_SCHEMAS};
use crate::db::traits::{CommandDispatcher, DispatchError};
use crate::manager::PgManager;

struct Script {
    command: String,
    filter: Option<(String, Value)>,
    reply: Result<Value, DispatchError>,
    gate: Option<oneshot::Receiver<()>>,
}

/// Scripted dispatcher: one-shot replies are consumed in the order they were
/// scripted (first match on command and optional argument filter). Unscripted
/// calls fail as unavailable. Every call is recorded.
#[derive(Default)]
pub struct MockDispatcher {
    scripts: Mutex<Vec<Script>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(
        &self,
        command: &str,
        filter: Option<(&str, Value)>,
        reply: Result<Value, DispatchError>,
        gate: Option<oneshot::Receiver<()>>,
    ) {
        self.scripts.lock().unwrap().push(Script {
            command: command.to_string(),
            filter: filter.map(|(k, v)| (k.to_string(), v)),
            reply,
            gate,
        });
    }

    pub fn respond(&self, command: &str, reply: Value) {
        self.push(command, None, Ok(reply), None);
    }

    /// Reply only to a call whose `arg` equals `expected`
    pub fn respond_when(&self, command: &str, arg: &str, expected: Value, reply: Value) {
        self.push(command, Some((arg, expected)), Ok(reply), None);
    }

    /// Like `respond_when`, but the reply is held until the returned sender fires
    pub fn respond_gated(
        &self,
        command: &str,
        arg: &str,
        expected: Value,
        reply: Value,
    ) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.push(command, Some((arg, expected)), Ok(reply), Some(rx));
        tx
    }

    pub fn fail(&self, command: &str, message: &str) {
        self.push(
            command,
            None,
            Err(DispatchError::Rejected(message.to_string())),
            None,
        );
    }

    pub fn fail_unavailable(&self, command: &str, message: &str) {
        self.push(
            command,
            None,
            Err(DispatchError::Unavailable(message.to_string())),
            None,
        );
    }

    pub fn calls_to(&self, command: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == command)
            .map(|(_, args)| args.clone())
            .collect()
    }

    pub fn call_count(&self, command: &str) -> usize {
        self.calls_to(command).len()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Yield until `command` has been dispatched at least `n` times
    pub async fn wait_for_calls(&self, command: &str, n: usize) {
        while self.call_count(command) < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait::async_trait]
impl CommandDispatcher for MockDispatcher {
    async fn invoke(&self, command: &str, args: Value) -> Result<Value, DispatchError> {
        let script = {
            self.calls
                .lock()
                .unwrap()
                .push((command.to_string(), args.clone()));
            let mut scripts = self.scripts.lock().unwrap();
            let pos = scripts.iter().position(|s| {
                s.command == command
                    && s
                        .filter
                        .as_ref()
                        .map_or(true, |(key, expected)| args.get(key) == Some(expected))
            });
            pos.map(|p| scripts.remove(p))
        };

        match script {
            Some(script) => {
                if let Some(gate) = script.gate {
                    let _ = gate.await;
                }
                script.reply
            }
            None => Err(DispatchError::Unavailable(format!(
                "no scripted reply for {command}"
            ))),
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn profile_json(id: &str, host: &str) -> Value {
    json!({
        "id": id,
        "label": null,
        "forward_id": null,
        "favorite_id": null,
        "host": host,
        "port": 5432,
        "database_name": "app",
        "username": "svc",
        "ssl_mode": "prefer",
        "color": null,
        "created_at": "2024-05-01 10:00:00",
        "last_used": null
    })
}

pub fn select_result_json(values: &[i64]) -> Value {
    json!({
        "columns": [{"name": "n", "data_type": "int4"}],
        "rows": values.iter().map(|v| json!([v])).collect::<Vec<_>>(),
        "total_rows": values.len(),
        "affected_rows": null,
        "duration_ms": 3,
        "query_type": "SELECT"
    })
}

pub fn table_json(schema: &str, name: &str) -> Value {
    json!({
        "schema_name": schema,
        "table_name": name,
        "table_type": "BASE TABLE",
        "estimated_rows": 10,
        "total_size": "16 kB"
    })
}

/// Connect `id` with an empty schema list scripted for the reload
pub async fn connect(manager: &PgManager, mock: &MockDispatcher, id: &str) {
    mock.respond_when(PG_CONNECT, "id", json!(id), json!(format!("Connected to {id}")));
    mock.respond_when(PG_LIST_SCHEMAS, "id", json!(id), json!([]));
    manager.connect(id).await.unwrap();
}
