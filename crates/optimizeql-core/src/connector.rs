//! Read-only connector contract implemented by each engine driver

use crate::{Dialect, ExplainResult, IndexInfo, QueryRows, Result, TableSchema};
use async_trait::async_trait;

/// A live, exclusively-owned handle to one database.
///
/// Every statement that reaches the engine runs inside a transaction that is
/// rolled back on every exit path, on a session marked read-only where the
/// engine supports it. Timeouts are enforced by the engine itself.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Engine family of this connector
    fn dialect(&self) -> Dialect;

    /// Run a trivial round trip. Never fails; returns `false` on any error.
    async fn test_connection(&self) -> bool;

    /// Plan and execute `sql` under `EXPLAIN ANALYZE`.
    ///
    /// Returns `OptimizeError::PlanExecution` when the statement cannot be
    /// planned, exceeds `timeout_ms`, or fails while running.
    async fn explain_analyze(&self, sql: &str, timeout_ms: u64) -> Result<ExplainResult>;

    /// Columns, indexes, row estimate and statistics for a table.
    ///
    /// A table that does not exist yields an empty schema, not an error.
    async fn get_table_schema(&self, table: &str, schema: Option<&str>) -> Result<TableSchema>;

    /// Existing indexes across several tables
    async fn get_existing_indexes(&self, tables: &[String]) -> Result<Vec<IndexInfo>>;

    /// Execute `sql`, returning at most `row_limit` rows
    async fn execute_limited(&self, sql: &str, row_limit: usize, timeout_ms: u64) -> Result<QueryRows>;

    /// Release the underlying connection. Idempotent; failures are logged, not returned.
    async fn close(&self);

    /// Whether `close` has already run
    fn is_closed(&self) -> bool;
}
