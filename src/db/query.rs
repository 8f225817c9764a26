// Query Result Models
// Shapes returned by pg_execute_query

use serde::{Deserialize, Serialize};

/// A single cell value in a result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// json/jsonb, arrays and anything else the backend renders as a structure
    Structured(serde_json::Value),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub data_type: String,
}

/// Statement classification as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    /// SELECT, WITH and EXPLAIN
    Select,
    Insert,
    Update,
    Delete,
    /// Everything else
    Ddl,
}

impl QueryType {
    /// Classify by leading keyword, case-insensitively
    pub(crate) fn classify(sql: &str) -> Self {
        let head = sql.trim_start().to_uppercase();
        if ["SELECT", "WITH", "EXPLAIN"].iter().any(|k| head.starts_with(k)) {
            QueryType::Select
        } else if head.starts_with("INSERT") {
            QueryType::Insert
        } else if head.starts_with("UPDATE") {
            QueryType::Update
        } else if head.starts_with("DELETE") {
            QueryType::Delete
        } else {
            QueryType::Ddl
        }
    }

    pub fn returns_rows(self) -> bool {
        self == QueryType::Select
    }
}

/// One page of a statement's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<CellValue>>,
    /// Only known for paginated SELECTs
    pub total_rows: Option<i64>,
    /// Only known for mutating statements
    pub affected_rows: Option<u64>,
    pub duration_ms: u64,
    pub query_type: QueryType,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// `pg_execute_query` reply as sent over the wire. Older backends omit
/// `query_type`; it is then derived from the statement text.
#[derive(Debug, Deserialize)]
pub(crate) struct QueryReply {
    columns: Vec<ColumnMeta>,
    rows: Vec<Vec<CellValue>>,
    total_rows: Option<i64>,
    affected_rows: Option<u64>,
    duration_ms: u64,
    query_type: Option<QueryType>,
}

impl QueryReply {
    pub(crate) fn into_result(self, sql: &str) -> QueryResult {
        QueryResult {
            columns: self.columns,
            rows: self.rows,
            total_rows: self.total_rows,
            affected_rows: self.affected_rows,
            duration_ms: self.duration_ms,
            query_type: self.query_type.unwrap_or_else(|| QueryType::classify(sql)),
        }
    }
}
