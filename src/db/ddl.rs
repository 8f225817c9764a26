// DDL Gateway
// Structural changes against the active connection. None of these refresh the
// schema cache; callers reload whatever they display afterward.

use serde::{Deserialize, Serialize};

use crate::commands::{
    self, AddColumnArgs, CreateTableArgs, DropObjectArgs, RenameTableArgs, PG_ADD_COLUMN,
    PG_CREATE_TABLE, PG_DROP_OBJECT, PG_RENAME_TABLE,
};
use crate::db::traits::{ManagerError, Origin};
use crate::manager::PgManager;

/// Column definition for `create_table` (sent with snake_case keys)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: String,
    pub is_primary_key: bool,
    pub is_nullable: bool,
    pub default_value: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_primary_key: false,
            is_nullable: true,
            default_value: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.default_value = Some(expr.into());
        self
    }
}

/// Column added to an existing table
#[derive(Debug, Clone, PartialEq)]
pub struct NewColumn {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObjectKind {
    Table,
    View,
    Index,
    Function,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropOptions {
    /// Also drop dependent objects. Never implied.
    pub cascade: bool,
}

impl DropOptions {
    pub fn cascade() -> Self {
        Self { cascade: true }
    }
}

impl PgManager {
    /// Each DDL call returns the backend's confirmation, or None as a guard
    /// no-op when there is no active connection.
    pub async fn create_table(
        &self,
        schema: &str,
        table_name: &str,
        columns: &[ColumnDefinition],
    ) -> Result<Option<String>, ManagerError> {
        let Some(id) = self.active_connection_id().await else {
            return Ok(None);
        };
        if columns.is_empty() {
            return Err(ManagerError::Execution(
                "At least one column is required".to_string(),
            ));
        }

        let message: String = commands::invoke(
            self.dispatcher(),
            Origin::Statement,
            PG_CREATE_TABLE,
            &CreateTableArgs { id: &id, schema, table_name, columns },
        )
        .await?;
        tracing::info!(connection_id = %id, schema, table = table_name, "table created");
        Ok(Some(message))
    }

    pub async fn add_column(
        &self,
        schema: &str,
        table: &str,
        column: &NewColumn,
    ) -> Result<Option<String>, ManagerError> {
        let Some(id) = self.active_connection_id().await else {
            return Ok(None);
        };

        let message: String = commands::invoke(
            self.dispatcher(),
            Origin::Statement,
            PG_ADD_COLUMN,
            &AddColumnArgs {
                id: &id,
                schema,
                table,
                column_name: &column.name,
                data_type: &column.data_type,
                is_nullable: column.is_nullable,
                default_value: column.default_value.as_deref(),
            },
        )
        .await?;
        tracing::info!(connection_id = %id, schema, table, column = %column.name, "column added");
        Ok(Some(message))
    }

    pub async fn drop_object(
        &self,
        kind: ObjectKind,
        schema: &str,
        name: &str,
        options: DropOptions,
    ) -> Result<Option<String>, ManagerError> {
        let Some(id) = self.active_connection_id().await else {
            return Ok(None);
        };

        let message: String = commands::invoke(
            self.dispatcher(),
            Origin::Statement,
            PG_DROP_OBJECT,
            &DropObjectArgs {
                id: &id,
                object_type: kind,
                schema,
                name,
                cascade: options.cascade,
            },
        )
        .await?;
        tracing::info!(connection_id = %id, ?kind, schema, name, cascade = options.cascade, "object dropped");
        Ok(Some(message))
    }

    pub async fn rename_table(
        &self,
        schema: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<Option<String>, ManagerError> {
        let Some(id) = self.active_connection_id().await else {
            return Ok(None);
        };

        let message: String = commands::invoke(
            self.dispatcher(),
            Origin::Statement,
            PG_RENAME_TABLE,
            &RenameTableArgs { id: &id, schema, old_name, new_name },
        )
        .await?;
        tracing::info!(connection_id = %id, schema, old_name, new_name, "table renamed");
        Ok(Some(message))
    }
}
