// Schema Cache
// Catalog metadata for the active connection, loaded lazily per entity

use serde::{Deserialize, Serialize};

use crate::commands::{
    self, IdArgs, SchemaArgs, TableArgs, PG_LIST_COLUMNS, PG_LIST_FUNCTIONS, PG_LIST_INDEXES,
    PG_LIST_SCHEMAS, PG_LIST_TABLES, PG_LIST_VIEWS, PG_TABLE_ROW_COUNT,
};
use crate::db::session::SessionTicket;
use crate::db::traits::{ManagerError, Origin};
use crate::manager::PgManager;

/// A table or view in a schema listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub schema_name: String,
    pub table_name: String,
    pub table_type: String, // "BASE TABLE" or "VIEW"
    pub estimated_rows: Option<i64>,
    pub total_size: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub column_default: Option<String>,
    pub is_primary_key: bool,
    pub ordinal_position: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub index_name: String,
    pub index_def: String,
    pub is_unique: bool,
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewInfo {
    pub schema_name: String,
    pub view_name: String,
    pub definition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub schema_name: String,
    pub function_name: String,
    pub result_type: String,
    pub argument_types: String,
    pub function_type: String, // "function", "procedure", "aggregate", "window"
}

/// The independently loaded parts of the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheEntity {
    Schemas,
    Tables,
    Columns,
    Indexes,
    Views,
    Functions,
}

impl CacheEntity {
    const COUNT: usize = 6;

    fn slot(self) -> usize {
        self as usize
    }
}

/// Metadata snapshot for the active connection only.
///
/// Each entity carries its own request stamp; a response is applied only if
/// it answers the latest request issued for that entity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaCache {
    pub schemas: Vec<String>,
    pub tables: Vec<TableInfo>,
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
    pub views: Vec<ViewInfo>,
    pub functions: Vec<FunctionInfo>,
    #[serde(skip)]
    issued: [u64; CacheEntity::COUNT],
}

impl SchemaCache {
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
            && self.tables.is_empty()
            && self.columns.is_empty()
            && self.indexes.is_empty()
            && self.views.is_empty()
            && self.functions.is_empty()
    }

    fn issue(&mut self, entity: CacheEntity) -> u64 {
        let seq = &mut self.issued[entity.slot()];
        *seq += 1;
        *seq
    }

    fn is_latest(&self, entity: CacheEntity, seq: u64) -> bool {
        self.issued[entity.slot()] == seq
    }

    /// Empty every entity and supersede every load still in flight
    pub(crate) fn invalidate(&mut self) {
        let issued = self.issued.map(|s| s + 1);
        *self = SchemaCache {
            issued,
            ..SchemaCache::default()
        };
    }
}

impl PgManager {
    /// Stamp a load for `entity` under the current active connection.
    /// None when there is no active connection.
    async fn begin_load(&self, entity: CacheEntity) -> Option<(SessionTicket, u64)> {
        let mut state = self.state.write().await;
        let ticket = state.session.ticket()?;
        let seq = state.cache.issue(entity);
        Some((ticket, seq))
    }

    async fn commit_load(
        &self,
        entity: CacheEntity,
        ticket: &SessionTicket,
        seq: u64,
        apply: impl FnOnce(&mut SchemaCache),
    ) {
        let mut state = self.state.write().await;
        if !state.session.is_current(ticket) {
            tracing::debug!(
                connection_id = %ticket.connection_id,
                ?entity,
                "discarding schema response for a connection that is no longer active"
            );
            return;
        }
        if !state.cache.is_latest(entity, seq) {
            tracing::debug!(?entity, seq, "discarding superseded schema response");
            return;
        }
        apply(&mut state.cache);
    }

    pub async fn load_schemas(&self) -> Result<(), ManagerError> {
        let Some((ticket, seq)) = self.begin_load(CacheEntity::Schemas).await else {
            return Ok(());
        };
        let schemas: Vec<String> = commands::invoke(
            self.dispatcher(),
            Origin::Catalog,
            PG_LIST_SCHEMAS,
            &IdArgs { id: &ticket.connection_id },
        )
        .await?;
        self.commit_load(CacheEntity::Schemas, &ticket, seq, |c| c.schemas = schemas)
            .await;
        Ok(())
    }

    pub async fn load_tables(&self, schema: &str) -> Result<(), ManagerError> {
        let Some((ticket, seq)) = self.begin_load(CacheEntity::Tables).await else {
            return Ok(());
        };
        let tables: Vec<TableInfo> = commands::invoke(
            self.dispatcher(),
            Origin::Catalog,
            PG_LIST_TABLES,
            &SchemaArgs { id: &ticket.connection_id, schema },
        )
        .await?;
        self.commit_load(CacheEntity::Tables, &ticket, seq, |c| c.tables = tables)
            .await;
        Ok(())
    }

    pub async fn load_columns(&self, schema: &str, table: &str) -> Result<(), ManagerError> {
        let Some((ticket, seq)) = self.begin_load(CacheEntity::Columns).await else {
            return Ok(());
        };
        let columns: Vec<ColumnInfo> = commands::invoke(
            self.dispatcher(),
            Origin::Catalog,
            PG_LIST_COLUMNS,
            &TableArgs { id: &ticket.connection_id, schema, table },
        )
        .await?;
        self.commit_load(CacheEntity::Columns, &ticket, seq, |c| c.columns = columns)
            .await;
        Ok(())
    }

    pub async fn load_indexes(&self, schema: &str, table: &str) -> Result<(), ManagerError> {
        let Some((ticket, seq)) = self.begin_load(CacheEntity::Indexes).await else {
            return Ok(());
        };
        let indexes: Vec<IndexInfo> = commands::invoke(
            self.dispatcher(),
            Origin::Catalog,
            PG_LIST_INDEXES,
            &TableArgs { id: &ticket.connection_id, schema, table },
        )
        .await?;
        self.commit_load(CacheEntity::Indexes, &ticket, seq, |c| c.indexes = indexes)
            .await;
        Ok(())
    }

    pub async fn load_views(&self, schema: &str) -> Result<(), ManagerError> {
        let Some((ticket, seq)) = self.begin_load(CacheEntity::Views).await else {
            return Ok(());
        };
        let views: Vec<ViewInfo> = commands::invoke(
            self.dispatcher(),
            Origin::Catalog,
            PG_LIST_VIEWS,
            &SchemaArgs { id: &ticket.connection_id, schema },
        )
        .await?;
        self.commit_load(CacheEntity::Views, &ticket, seq, |c| c.views = views)
            .await;
        Ok(())
    }

    pub async fn load_functions(&self, schema: &str) -> Result<(), ManagerError> {
        let Some((ticket, seq)) = self.begin_load(CacheEntity::Functions).await else {
            return Ok(());
        };
        let functions: Vec<FunctionInfo> = commands::invoke(
            self.dispatcher(),
            Origin::Catalog,
            PG_LIST_FUNCTIONS,
            &SchemaArgs { id: &ticket.connection_id, schema },
        )
        .await?;
        self.commit_load(CacheEntity::Functions, &ticket, seq, |c| c.functions = functions)
            .await;
        Ok(())
    }

    /// Tables, views and functions of one schema, fetched concurrently
    pub async fn load_schema_objects(&self, schema: &str) -> Result<(), ManagerError> {
        futures::try_join!(
            self.load_tables(schema),
            self.load_views(schema),
            self.load_functions(schema)
        )?;
        Ok(())
    }

    /// Columns and indexes of one table, fetched concurrently
    pub async fn load_table_details(&self, schema: &str, table: &str) -> Result<(), ManagerError> {
        futures::try_join!(
            self.load_columns(schema, table),
            self.load_indexes(schema, table)
        )?;
        Ok(())
    }

    /// Fresh row count probe; never cached. Zero without an active connection.
    pub async fn get_row_count(&self, schema: &str, table: &str) -> Result<i64, ManagerError> {
        let Some(ticket) = self.state.read().await.session.ticket() else {
            return Ok(0);
        };
        commands::invoke(
            self.dispatcher(),
            Origin::Statement,
            PG_TABLE_ROW_COUNT,
            &TableArgs { id: &ticket.connection_id, schema, table },
        )
        .await
    }

    pub async fn schema_cache(&self) -> SchemaCache {
        self.state.read().await.cache.clone()
    }
}
