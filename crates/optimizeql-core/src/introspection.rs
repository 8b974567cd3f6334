//! Introspection data model: what a connector reports about a query and its tables

use crate::Dialect;
use serde::{Deserialize, Serialize};

/// Planner statistics for a single column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ColumnStat {
    pub column_name: String,
    /// Fraction of NULL entries, in `[0, 1]`
    pub null_frac: f64,
    /// Average width in bytes
    pub avg_width: i32,
    /// Engine-reported distinctness. Negative values are a fraction of the row
    /// count (`-1` means every row is distinct), positive values an absolute count.
    pub n_distinct: f64,
    pub most_common_vals: Vec<String>,
    /// Same length as `most_common_vals`
    pub most_common_freqs: Vec<f64>,
}

/// An existing index on a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub index_name: String,
    pub table_name: String,
    /// Key columns in index order
    pub columns: Vec<String>,
    pub is_unique: bool,
    /// Engine-specific access method (`btree`, `gin`, `fulltext`, ...)
    pub index_type: String,
    /// `CREATE INDEX` statement when the engine can produce one
    #[serde(default)]
    pub definition: Option<String>,
}

/// A column as declared in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: bool,
    #[serde(default)]
    pub column_default: Option<String>,
}

/// Catalog metadata for one referenced table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnDescriptor>,
    /// Approximate row count from engine statistics; may be stale, zero or negative
    pub row_count: i64,
    pub indexes: Vec<IndexInfo>,
    pub column_stats: Vec<ColumnStat>,
}

impl TableSchema {
    /// Schema for a table the catalog knows nothing about
    pub fn empty(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.indexes.is_empty()
    }
}

/// Output of `EXPLAIN ANALYZE`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainResult {
    /// Plan text exactly as the prompt should show it
    pub raw_plan: String,
    pub planning_time_ms: Option<f64>,
    pub execution_time_ms: Option<f64>,
}

/// Everything known about a query before it is sent to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrospectionContext {
    pub sql: String,
    pub explain: Option<ExplainResult>,
    /// Message of the failed explain attempt, if one was made
    pub explain_error: Option<String>,
    /// Tables that were successfully introspected
    pub table_schemas: Vec<TableSchema>,
    /// Lowercase, deduplicated and sorted; may list tables missing from `table_schemas`
    pub table_names: Vec<String>,
    pub dialect: Option<Dialect>,
}

impl IntrospectionContext {
    /// Context for a query analyzed without a live database
    pub fn offline(sql: impl Into<String>, table_names: Vec<String>) -> Self {
        Self {
            sql: sql.into(),
            explain: None,
            explain_error: None,
            table_schemas: Vec::new(),
            table_names,
            dialect: None,
        }
    }

    pub fn with_dialect(mut self, dialect: Option<Dialect>) -> Self {
        self.dialect = dialect;
        self
    }
}
