use async_trait::async_trait;
use futures::future::BoxFuture;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Row as MySqlRow, SslOpts};
use optimizeql_core::limit::{LimitedSql, apply_limit, single_statement};
use optimizeql_core::{
    Connector, ConnectionConfig, Dialect, ExplainResult, IndexInfo, OptimizeError, QueryRows, Result,
    TableSchema,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::catalog;
use crate::values::{cell_text, row_to_values};

/// Extra time granted to the client-side backstop beyond the engine timeout
const CLIENT_GRACE: Duration = Duration::from_secs(5);
const PING_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const CATALOG_TIMEOUT_MS: u64 = 10_000;

pub(crate) fn format_mysql_error(error: &mysql_async::Error) -> String {
    match error {
        mysql_async::Error::Server(server) => format!(
            "ERROR {} ({}): {}",
            server.code, server.state, server.message
        ),
        other => other.to_string(),
    }
}

/// Statement body for `EXPLAIN ANALYZE`, which has to go over the text protocol.
///
/// The server splits text-protocol input on every `;` and reads some comment
/// forms (`--x`, `/*! ... */`) differently from the tokenizer, so no `;` may
/// remain in the body at all.
pub(crate) fn explain_body(sql: &str) -> Result<&str> {
    let body = single_statement(sql, Dialect::Mysql).map_err(|e| OptimizeError::PlanExecution(e.to_string()))?;
    if body.contains(';') {
        return Err(OptimizeError::PlanExecution(
            "MySQL statements containing ';' cannot be explained".to_string(),
        ));
    }
    Ok(body)
}

/// Read-only MySQL connector holding one dedicated connection
pub struct MySqlConnector {
    conn: Mutex<Option<Conn>>,
    closed: AtomicBool,
    database: String,
}

impl MySqlConnector {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let database = config.database.clone().ok_or_else(|| {
            OptimizeError::Configuration("a MySQL connection needs a database name".to_string())
        })?;
        tracing::info!(
            host = %config.host,
            port = %config.port,
            database = %database,
            ssl = config.ssl,
            "connecting to MySQL database"
        );

        let mut opts = OptsBuilder::from_opts(Opts::default())
            .ip_or_hostname(config.host.as_str())
            .tcp_port(config.port)
            .db_name(Some(database.as_str()))
            .user(config.username.as_deref())
            .pass(config.password.as_deref());

        if config.ssl {
            // same trust model as PostgreSQL's sslmode=require
            opts = opts.ssl_opts(Some(
                SslOpts::default()
                    .with_danger_accept_invalid_certs(true)
                    .with_danger_skip_domain_validation(true),
            ));
        }

        let connect_timeout = Duration::from_secs(
            config
                .get_u64("connect_timeout_secs")
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        );
        let mut conn = tokio::time::timeout(connect_timeout, Conn::new(opts))
            .await
            .map_err(|_| {
                OptimizeError::Connection(format!(
                    "Timed out connecting to MySQL after {} s",
                    connect_timeout.as_secs()
                ))
            })?
            .map_err(|e| OptimizeError::Connection(format!("Failed to connect to MySQL: {}", format_mysql_error(&e))))?;

        conn.query_drop("SET SESSION TRANSACTION READ ONLY")
            .await
            .map_err(|e| {
                OptimizeError::Connection(format!(
                    "Failed to make the session read-only: {}",
                    format_mysql_error(&e)
                ))
            })?;

        tracing::info!(host = %config.host, database = %database, "MySQL connection established");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            closed: AtomicBool::new(false),
            database,
        })
    }

    /// Run `op` inside a `READ ONLY` transaction that is always rolled back.
    ///
    /// `MAX_EXECUTION_TIME` bounds SELECTs on the server; a client-side timer
    /// with some grace covers everything else.
    async fn sandboxed<T, F>(&self, timeout_ms: u64, op: F) -> Result<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut Conn) -> BoxFuture<'c, Result<T>> + Send,
    {
        let backstop = Duration::from_millis(timeout_ms) + CLIENT_GRACE;
        let work = async {
            let mut guard = self.conn.lock().await;
            let conn = guard
                .as_mut()
                .ok_or_else(|| OptimizeError::Connection("connector is closed".to_string()))?;

            conn.query_drop(format!("SET SESSION MAX_EXECUTION_TIME = {}", timeout_ms))
                .await
                .map_err(|e| {
                    OptimizeError::Query(format!("Failed to set execution time limit: {}", format_mysql_error(&e)))
                })?;
            conn.query_drop("START TRANSACTION READ ONLY")
                .await
                .map_err(|e| OptimizeError::Connection(format!("Failed to begin transaction: {}", format_mysql_error(&e))))?;

            let outcome = op(&mut *conn).await;

            if let Err(e) = conn.query_drop("ROLLBACK").await {
                tracing::warn!(error = %format_mysql_error(&e), "failed to roll back sandbox transaction");
            }
            outcome
        };

        tokio::time::timeout(backstop, work).await.map_err(|_| {
            OptimizeError::Timeout(format!(
                "MySQL did not answer within {} ms",
                backstop.as_millis()
            ))
        })?
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    async fn test_connection(&self) -> bool {
        let ping = async {
            let mut guard = self.conn.lock().await;
            match guard.as_mut() {
                Some(conn) => match conn.query_drop("SELECT 1").await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(error = %format_mysql_error(&e), "MySQL connection test failed");
                        false
                    }
                },
                None => false,
            }
        };
        match tokio::time::timeout(PING_TIMEOUT, ping).await {
            Ok(ok) => ok,
            Err(_) => {
                tracing::warn!(database = %self.database, "MySQL ping timed out");
                false
            }
        }
    }

    /// `EXPLAIN ANALYZE` (8.0.18+) prints a text tree; timings stay inside it
    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn explain_analyze(&self, sql: &str, timeout_ms: u64) -> Result<ExplainResult> {
        let statement = format!("EXPLAIN ANALYZE {}", explain_body(sql)?);

        let lines: Vec<String> = self
            .sandboxed(timeout_ms, move |conn| {
                Box::pin(async move {
                    let rows: Vec<MySqlRow> = conn
                        .query(statement)
                        .await
                        .map_err(|e| OptimizeError::PlanExecution(format_mysql_error(&e)))?;
                    Ok(rows.iter().map(|row| cell_text(row, 0).unwrap_or_default()).collect())
                })
            })
            .await
            .map_err(|e| match e {
                OptimizeError::PlanExecution(_) => e,
                other => OptimizeError::PlanExecution(other.to_string()),
            })?;

        tracing::debug!(lines = lines.len(), "EXPLAIN ANALYZE completed");
        Ok(ExplainResult {
            raw_plan: lines.join("\n"),
            planning_time_ms: None,
            execution_time_ms: None,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn get_table_schema(&self, table: &str, schema: Option<&str>) -> Result<TableSchema> {
        let schema = schema.unwrap_or(&self.database).to_string();
        let table = table.to_string();

        self.sandboxed(CATALOG_TIMEOUT_MS, move |conn| {
            Box::pin(async move {
                let columns = catalog::columns(conn, &schema, &table).await?;
                if columns.is_empty() {
                    tracing::debug!(table = %table, schema = %schema, "table not found in catalog");
                    return Ok(TableSchema::empty(&table));
                }

                let row_count = catalog::row_estimate(conn, &schema, &table).await?;
                let indexes = catalog::indexes(conn, &schema, std::slice::from_ref(&table)).await?;
                let column_stats = catalog::column_stats(conn, &schema, &table).await?;

                Ok(TableSchema {
                    table_name: table,
                    columns,
                    row_count,
                    indexes,
                    column_stats,
                })
            })
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn get_existing_indexes(&self, tables: &[String]) -> Result<Vec<IndexInfo>> {
        let schema = self.database.clone();
        let tables = tables.to_vec();
        self.sandboxed(CATALOG_TIMEOUT_MS, move |conn| {
            Box::pin(async move { catalog::indexes(conn, &schema, &tables).await })
        })
        .await
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute_limited(&self, sql: &str, row_limit: usize, timeout_ms: u64) -> Result<QueryRows> {
        let limited = apply_limit(sql, row_limit, Dialect::Mysql)?;
        if let LimitedSql::Unchanged(_) = limited {
            tracing::debug!("statement has no boundable LIMIT, truncating rows client-side");
        }
        let statement = limited.sql().to_string();

        self.sandboxed(timeout_ms, move |conn| {
            Box::pin(async move {
                // prepared statements never carry more than one statement
                let mut result = conn
                    .exec_iter(statement, ())
                    .await
                    .map_err(|e| OptimizeError::Query(format_mysql_error(&e)))?;
                let columns = result
                    .columns_ref()
                    .iter()
                    .map(|c| c.name_str().into_owned())
                    .collect();
                let rows: Vec<MySqlRow> = result
                    .collect_and_drop()
                    .await
                    .map_err(|e| OptimizeError::Query(format_mysql_error(&e)))?;

                let rows = rows.iter().take(row_limit).map(row_to_values).collect();
                Ok(QueryRows::new(columns, rows))
            })
        })
        .await
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let conn = match tokio::time::timeout(PING_TIMEOUT, self.conn.lock()).await {
            Ok(mut guard) => guard.take(),
            Err(_) => {
                tracing::warn!(database = %self.database, "timed out waiting to close MySQL connector");
                return;
            }
        };
        if let Some(conn) = conn {
            if let Err(e) = conn.disconnect().await {
                tracing::debug!(error = %format_mysql_error(&e), "MySQL disconnect failed");
            }
        }
        tracing::debug!(database = %self.database, "MySQL connector closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
