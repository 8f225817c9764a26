// Export Gateway
// Bulk export of arbitrary SQL to a file, performed by the backend

use serde::{Deserialize, Serialize};

use crate::commands::{self, ExportArgs, PG_EXPORT_CSV, PG_EXPORT_JSON};
use crate::db::traits::{ManagerError, Origin};
use crate::manager::PgManager;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    fn command(self) -> &'static str {
        match self {
            ExportFormat::Csv => PG_EXPORT_CSV,
            ExportFormat::Json => PG_EXPORT_JSON,
        }
    }
}

/// The backend answers with either a bare count or a confirmation message
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExportResponse {
    Count(u64),
    Message(String),
}

/// Pull N out of "Exported N rows to <path>"
fn parse_row_count(message: &str) -> Option<u64> {
    let rest = message.trim().strip_prefix("Exported ")?;
    let (count, tail) = rest.split_once(' ')?;
    if !tail.starts_with("row") {
        return None;
    }
    count.parse().ok()
}

impl PgManager {
    /// Export the rows of `sql` to `file_path`. Returns the number of rows
    /// written, or 0 without touching the backend when nothing is active.
    pub async fn export(
        &self,
        format: ExportFormat,
        sql: &str,
        file_path: &str,
    ) -> Result<u64, ManagerError> {
        let Some(id) = self.active_connection_id().await else {
            return Ok(0);
        };

        let command = format.command();
        let response: ExportResponse = commands::invoke(
            self.dispatcher(),
            Origin::Statement,
            command,
            &ExportArgs { id: &id, sql, file_path },
        )
        .await?;

        let rows = match response {
            ExportResponse::Count(rows) => rows,
            ExportResponse::Message(message) => parse_row_count(&message).ok_or_else(|| {
                ManagerError::Backend(format!("unrecognized response for {command}: {message}"))
            })?,
        };
        tracing::info!(connection_id = %id, ?format, rows, file_path, "export finished");
        Ok(rows)
    }

    pub async fn export_csv(&self, sql: &str, file_path: &str) -> Result<u64, ManagerError> {
        self.export(ExportFormat::Csv, sql, file_path).await
    }

    pub async fn export_json(&self, sql: &str, file_path: &str) -> Result<u64, ManagerError> {
        self.export(ExportFormat::Json, sql, file_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::traits::ErrorKind;
    use crate::test_helpers::{connect, MockDispatcher};
    use serde_json::json;

    #[test]
    fn test_parse_row_count() {
        assert_eq!(parse_row_count("Exported 1200 rows to /tmp/out.csv"), Some(1200));
        assert_eq!(parse_row_count("Exported 0 rows to /tmp/out.json"), Some(0));
        assert_eq!(parse_row_count("Done"), None);
        assert_eq!(parse_row_count("Exported many rows to x"), None);
    }

    #[tokio::test]
    async fn test_export_without_connection_returns_zero() {
        let mock = MockDispatcher::new();
        let manager = PgManager::new(mock.clone());

        assert_eq!(manager.export_csv("SELECT 1", "/tmp/x.csv").await.unwrap(), 0);
        assert_eq!(manager.export_json("SELECT 1", "/tmp/x.json").await.unwrap(), 0);
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_export_decodes_message_and_count() {
        let mock = MockDispatcher::new();
        let manager = PgManager::new(mock.clone());
        connect(&manager, &mock, "a").await;

        mock.respond(PG_EXPORT_CSV, json!("Exported 3 rows to /tmp/users.csv"));
        mock.respond(PG_EXPORT_JSON, json!(5));

        let csv = manager
            .export_csv("SELECT * FROM users", "/tmp/users.csv")
            .await
            .unwrap();
        let json_rows = manager
            .export_json("SELECT * FROM orders", "/tmp/orders.json")
            .await
            .unwrap();

        assert_eq!(csv, 3);
        assert_eq!(json_rows, 5);
        assert_eq!(
            mock.calls_to(PG_EXPORT_CSV),
            vec![json!({"id": "a", "sql": "SELECT * FROM users", "filePath": "/tmp/users.csv"})]
        );
    }

    #[tokio::test]
    async fn test_export_failure_propagates() {
        let mock = MockDispatcher::new();
        let manager = PgManager::new(mock.clone());
        connect(&manager, &mock, "a").await;

        mock.fail(PG_EXPORT_CSV, "Failed to create file: Permission denied (os error 13)");
        let err = manager.export_csv("SELECT 1", "/root/x.csv").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);

        mock.respond(PG_EXPORT_JSON, json!("Done"));
        let err = manager.export_json("SELECT 1", "/tmp/x.json").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
    }
}
