// IPC Bridge - command names, argument payloads and typed invoke helpers
// Every backend interaction of the manager goes through this module

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::ddl::{ColumnDefinition, ObjectKind};
use crate::db::traits::{CommandDispatcher, ManagerError, Origin};
use crate::db::SslMode;

// ============================================================================
// Command names
// ============================================================================

pub const PG_LIST_CONNECTIONS: &str = "pg_list_connections";
pub const PG_SAVE_CONNECTION: &str = "pg_save_connection";
pub const PG_DELETE_CONNECTION: &str = "pg_delete_connection";
pub const PG_TEST_CONNECTION: &str = "pg_test_connection";
pub const PG_CONNECT: &str = "pg_connect";
pub const PG_DISCONNECT: &str = "pg_disconnect";
pub const PG_LIST_SCHEMAS: &str = "pg_list_schemas";
pub const PG_LIST_TABLES: &str = "pg_list_tables";
pub const PG_LIST_COLUMNS: &str = "pg_list_columns";
pub const PG_LIST_INDEXES: &str = "pg_list_indexes";
pub const PG_TABLE_ROW_COUNT: &str = "pg_table_row_count";
pub const PG_EXECUTE_QUERY: &str = "pg_execute_query";
pub const PG_LIST_QUERY_HISTORY: &str = "pg_list_query_history";
pub const PG_SAVE_QUERY: &str = "pg_save_query";
pub const PG_LIST_SAVED_QUERIES: &str = "pg_list_saved_queries";
pub const PG_DELETE_SAVED_QUERY: &str = "pg_delete_saved_query";
pub const PG_LIST_VIEWS: &str = "pg_list_views";
pub const PG_LIST_FUNCTIONS: &str = "pg_list_functions";
pub const PG_CREATE_TABLE: &str = "pg_create_table";
pub const PG_ADD_COLUMN: &str = "pg_add_column";
pub const PG_DROP_OBJECT: &str = "pg_drop_object";
pub const PG_RENAME_TABLE: &str = "pg_rename_table";
pub const PG_EXPORT_CSV: &str = "pg_export_csv";
pub const PG_EXPORT_JSON: &str = "pg_export_json";

// ============================================================================
// Argument payloads (camelCase on the wire)
// ============================================================================

#[derive(Debug, Serialize)]
pub struct NoArgs {}

#[derive(Debug, Serialize)]
pub struct IdArgs<'a> {
    pub id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveConnectionArgs<'a> {
    pub id: Option<&'a str>,
    pub label: Option<&'a str>,
    pub forward_id: Option<&'a str>,
    pub favorite_id: Option<&'a str>,
    pub host: &'a str,
    pub port: u16,
    pub database_name: &'a str,
    pub username: &'a str,
    pub password: Option<&'a str>,
    pub ssl_mode: SslMode,
    pub color: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionArgs<'a> {
    pub host: &'a str,
    pub port: u16,
    pub database_name: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SchemaArgs<'a> {
    pub id: &'a str,
    pub schema: &'a str,
}

#[derive(Debug, Serialize)]
pub struct TableArgs<'a> {
    pub id: &'a str,
    pub schema: &'a str,
    pub table: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteQueryArgs<'a> {
    pub id: &'a str,
    pub sql: &'a str,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryArgs<'a> {
    pub connection_id: &'a str,
    pub limit: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveQueryArgs<'a> {
    pub connection_id: Option<&'a str>,
    pub label: &'a str,
    pub sql_text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQueriesArgs<'a> {
    pub connection_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableArgs<'a> {
    pub id: &'a str,
    pub schema: &'a str,
    pub table_name: &'a str,
    pub columns: &'a [ColumnDefinition],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddColumnArgs<'a> {
    pub id: &'a str,
    pub schema: &'a str,
    pub table: &'a str,
    pub column_name: &'a str,
    pub data_type: &'a str,
    pub is_nullable: bool,
    pub default_value: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DropObjectArgs<'a> {
    pub id: &'a str,
    pub object_type: ObjectKind,
    pub schema: &'a str,
    pub name: &'a str,
    pub cascade: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameTableArgs<'a> {
    pub id: &'a str,
    pub schema: &'a str,
    pub old_name: &'a str,
    pub new_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArgs<'a> {
    pub id: &'a str,
    pub sql: &'a str,
    pub file_path: &'a str,
}

// ============================================================================
// Typed invoke helpers
// ============================================================================

/// Serialize `args`, dispatch `command`, and decode the response into `T`
pub(crate) async fn invoke<A, T>(
    dispatcher: &dyn CommandDispatcher,
    origin: Origin,
    command: &str,
    args: &A,
) -> Result<T, ManagerError>
where
    A: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let payload = serde_json::to_value(args).map_err(|e| {
        ManagerError::Backend(format!("failed to encode arguments for {command}: {e}"))
    })?;

    tracing::trace!(command, "dispatching");
    let response = dispatcher
        .invoke(command, payload)
        .await
        .map_err(|e| ManagerError::from_dispatch(origin, e))?;

    serde_json::from_value(response).map_err(|e| {
        ManagerError::Backend(format!("malformed response for {command}: {e}"))
    })
}

/// Dispatch a command whose response body carries nothing the caller needs
pub(crate) async fn invoke_unit<A>(
    dispatcher: &dyn CommandDispatcher,
    origin: Origin,
    command: &str,
    args: &A,
) -> Result<(), ManagerError>
where
    A: Serialize + ?Sized,
{
    invoke::<A, serde_json::Value>(dispatcher, origin, command, args)
        .await
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::traits::ErrorKind;
    use crate::test_helpers::MockDispatcher;
    use serde_json::json;

    #[test]
    fn test_payloads_use_camel_case() {
        let args = ExecuteQueryArgs {
            id: "c1",
            sql: "SELECT 1",
            page: 2,
            page_size: 50,
        };
        let value = serde_json::to_value(&args).unwrap();
        assert_eq!(
            value,
            json!({"id": "c1", "sql": "SELECT 1", "page": 2, "pageSize": 50})
        );

        let args = SaveConnectionArgs {
            id: None,
            label: None,
            forward_id: Some("fwd-1"),
            favorite_id: None,
            host: "db.internal",
            port: 5432,
            database_name: "app",
            username: "svc",
            password: None,
            ssl_mode: SslMode::Require,
            color: None,
        };
        let value = serde_json::to_value(&args).unwrap();
        assert_eq!(value["forwardId"], json!("fwd-1"));
        assert_eq!(value["databaseName"], json!("app"));
        assert_eq!(value["sslMode"], json!("require"));
    }

    #[tokio::test]
    async fn test_invoke_decodes_response() {
        let mock = MockDispatcher::new();
        mock.respond(PG_LIST_SCHEMAS, json!(["public", "audit"]));

        let schemas: Vec<String> = invoke(
            &*mock,
            Origin::Catalog,
            PG_LIST_SCHEMAS,
            &IdArgs { id: "c1" },
        )
        .await
        .unwrap();

        assert_eq!(schemas, vec!["public".to_string(), "audit".to_string()]);
        assert_eq!(mock.calls_to(PG_LIST_SCHEMAS), vec![json!({"id": "c1"})]);
    }

    #[tokio::test]
    async fn test_invoke_reports_malformed_response() {
        let mock = MockDispatcher::new();
        mock.respond(PG_LIST_SCHEMAS, json!({"unexpected": true}));

        let err = invoke::<_, Vec<String>>(
            &*mock,
            Origin::Catalog,
            PG_LIST_SCHEMAS,
            &IdArgs { id: "c1" },
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(err.message().contains("malformed response for pg_list_schemas"));
    }
}
