//! PostgreSQL connector: read-only sessions, rolled-back transactions

use async_trait::async_trait;
use futures::future::BoxFuture;
use native_tls::TlsConnector;
use optimizeql_core::limit::{LimitedSql, apply_limit, single_statement};
use optimizeql_core::{
    Connector, ConnectionConfig, Dialect, ExplainResult, IndexInfo, OptimizeError, QueryRows, Result,
    TableSchema,
};
use postgres_native_tls::MakeTlsConnector;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_postgres::config::SslMode;
use tokio_postgres::{Client, NoTls, Transaction};

use crate::catalog::{self, DEFAULT_SCHEMA};
use crate::values::postgres_to_value;

/// Extra time granted to the client-side backstop beyond the engine timeout
const CLIENT_GRACE: Duration = Duration::from_secs(5);
const PING_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const CATALOG_TIMEOUT_MS: u64 = 10_000;

pub(crate) fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut message = format!("{}: {}", db_error.severity(), db_error.message());

    if let Some(detail) = db_error.detail().filter(|d| !d.trim().is_empty()) {
        message.push_str(&format!(" (detail: {})", detail));
    }
    if let Some(hint) = db_error.hint().filter(|h| !h.trim().is_empty()) {
        message.push_str(&format!(" (hint: {})", hint));
    }

    format!("{} (code: {})", message, db_error.code().code())
}

/// Read-only PostgreSQL connector.
///
/// The session starts with `default_transaction_read_only=on` and every
/// operation runs in a `READ ONLY` transaction that is rolled back.
pub struct PostgresConnector {
    client: Mutex<Option<Client>>,
    closed: AtomicBool,
    database: String,
}

impl PostgresConnector {
    /// Open a connection described by `config`
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let database = config.database.clone().unwrap_or_else(|| "postgres".to_string());
        tracing::info!(
            host = %config.host,
            port = %config.port,
            database = %database,
            ssl = config.ssl,
            "connecting to PostgreSQL database"
        );

        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&config.host)
            .port(config.port)
            .dbname(&database)
            .options("-c default_transaction_read_only=on")
            .application_name("optimizeql")
            .connect_timeout(Duration::from_secs(
                config
                    .get_u64("connect_timeout_secs")
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ))
            .ssl_mode(if config.ssl { SslMode::Require } else { SslMode::Prefer });

        if let Some(user) = &config.username {
            pg_config.user(user);
        }
        if let Some(password) = &config.password {
            pg_config.password(password);
        }

        // `require` encrypts without verifying the chain, matching libpq's sslmode=require
        let tls_connector = TlsConnector::builder()
            .danger_accept_invalid_certs(config.ssl)
            .danger_accept_invalid_hostnames(config.ssl)
            .build()
            .map_err(|e| OptimizeError::Connection(format!("Failed to build TLS connector: {}", e)))?;

        let first_attempt = pg_config.connect(MakeTlsConnector::new(tls_connector)).await;
        let client = match first_attempt {
            Ok((client, connection)) => {
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::error!(error = %e, "PostgreSQL connection error");
                    }
                });
                client
            }
            Err(first_error) if !config.ssl => {
                tracing::debug!(error = %first_error, "connection with TLS failed, retrying without TLS");
                let (client, connection) = pg_config
                    .ssl_mode(SslMode::Disable)
                    .connect(NoTls)
                    .await
                    .map_err(|e| {
                        OptimizeError::Connection(format!(
                            "Failed to connect to PostgreSQL: {}",
                            format_postgres_error(&e)
                        ))
                    })?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::error!(error = %e, "PostgreSQL connection error");
                    }
                });
                client
            }
            Err(e) => {
                return Err(OptimizeError::Connection(format!(
                    "Failed to connect to PostgreSQL: {}",
                    format_postgres_error(&e)
                )));
            }
        };

        tracing::info!(host = %config.host, database = %database, "PostgreSQL connection established");
        Ok(Self {
            client: Mutex::new(Some(client)),
            closed: AtomicBool::new(false),
            database,
        })
    }

    /// Run `op` inside a read-only transaction that is always rolled back.
    ///
    /// `timeout_ms` is applied with `SET LOCAL statement_timeout`; a
    /// client-side timer with some grace catches connections that stop
    /// answering altogether.
    async fn sandboxed<T, F>(&self, timeout_ms: u64, op: F) -> Result<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t Transaction<'t>) -> BoxFuture<'t, Result<T>> + Send,
    {
        let backstop = Duration::from_millis(timeout_ms) + CLIENT_GRACE;
        let work = async {
            let mut guard = self.client.lock().await;
            let client = guard
                .as_mut()
                .ok_or_else(|| OptimizeError::Connection("connector is closed".to_string()))?;
            if client.is_closed() {
                return Err(OptimizeError::Connection("PostgreSQL connection was lost".to_string()));
            }

            let tx = client
                .build_transaction()
                .read_only(true)
                .start()
                .await
                .map_err(|e| OptimizeError::Connection(format!("Failed to begin transaction: {}", format_postgres_error(&e))))?;

            let outcome = match tx
                .batch_execute(&format!("SET LOCAL statement_timeout = {}", timeout_ms))
                .await
            {
                Ok(()) => op(&tx).await,
                Err(e) => Err(OptimizeError::Query(format!(
                    "Failed to set statement timeout: {}",
                    format_postgres_error(&e)
                ))),
            };

            if let Err(e) = tx.rollback().await {
                tracing::warn!(error = %format_postgres_error(&e), "failed to roll back sandbox transaction");
            }
            outcome
        };

        tokio::time::timeout(backstop, work).await.map_err(|_| {
            OptimizeError::Timeout(format!(
                "PostgreSQL did not answer within {} ms",
                backstop.as_millis()
            ))
        })?
    }
}

/// Pull `Planning Time` / `Execution Time` out of `EXPLAIN (FORMAT JSON)` output
pub(crate) fn plan_timings(plan: &serde_json::Value) -> (Option<f64>, Option<f64>) {
    let top = plan.get(0).unwrap_or(plan);
    (
        top.get("Planning Time").and_then(|v| v.as_f64()),
        top.get("Execution Time").and_then(|v| v.as_f64()),
    )
}

#[async_trait]
impl Connector for PostgresConnector {
    fn dialect(&self) -> Dialect {
        Dialect::Postgresql
    }

    async fn test_connection(&self) -> bool {
        let ping = async {
            let guard = self.client.lock().await;
            match guard.as_ref() {
                Some(client) => client.simple_query("SELECT 1").await.is_ok(),
                None => false,
            }
        };
        match tokio::time::timeout(PING_TIMEOUT, ping).await {
            Ok(ok) => ok,
            Err(_) => {
                tracing::warn!(database = %self.database, "PostgreSQL ping timed out");
                false
            }
        }
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn explain_analyze(&self, sql: &str, timeout_ms: u64) -> Result<ExplainResult> {
        let body = single_statement(sql, Dialect::Postgresql)
            .map_err(|e| OptimizeError::PlanExecution(e.to_string()))?;
        let statement = format!("EXPLAIN (ANALYZE, BUFFERS, FORMAT JSON) {}", body);

        let plan: serde_json::Value = self
            .sandboxed(timeout_ms, move |tx| {
                Box::pin(async move {
                    let row = tx
                        .query_one(statement.as_str(), &[])
                        .await
                        .map_err(|e| OptimizeError::PlanExecution(format_postgres_error(&e)))?;
                    row.try_get::<_, serde_json::Value>(0)
                        .map_err(|e| OptimizeError::PlanExecution(format!("Unreadable plan output: {}", e)))
                })
            })
            .await
            .map_err(|e| match e {
                OptimizeError::PlanExecution(_) => e,
                other => OptimizeError::PlanExecution(other.to_string()),
            })?;

        let (planning_time_ms, execution_time_ms) = plan_timings(&plan);
        let raw_plan = serde_json::to_string_pretty(&plan)?;
        tracing::debug!(
            planning_time_ms = ?planning_time_ms,
            execution_time_ms = ?execution_time_ms,
            "EXPLAIN ANALYZE completed"
        );

        Ok(ExplainResult {
            raw_plan,
            planning_time_ms,
            execution_time_ms,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn get_table_schema(&self, table: &str, schema: Option<&str>) -> Result<TableSchema> {
        let schema = schema.unwrap_or(DEFAULT_SCHEMA).to_string();
        let table = table.to_string();

        self.sandboxed(CATALOG_TIMEOUT_MS, move |tx| {
            Box::pin(async move {
                let columns = catalog::columns(tx, &schema, &table).await?;
                if columns.is_empty() {
                    tracing::debug!(table = %table, schema = %schema, "table not found in catalog");
                    return Ok(TableSchema::empty(&table));
                }

                let row_count = catalog::row_estimate(tx, &schema, &table).await?;
                let indexes = catalog::indexes(tx, &schema, std::slice::from_ref(&table)).await?;
                let column_stats = catalog::column_stats(tx, &schema, &table).await?;

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
        let tables = tables.to_vec();
        self.sandboxed(CATALOG_TIMEOUT_MS, move |tx| {
            Box::pin(async move { catalog::indexes(tx, DEFAULT_SCHEMA, &tables).await })
        })
        .await
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute_limited(&self, sql: &str, row_limit: usize, timeout_ms: u64) -> Result<QueryRows> {
        let limited = apply_limit(sql, row_limit, Dialect::Postgresql)?;
        if let LimitedSql::Unchanged(_) = limited {
            tracing::debug!("statement has no boundable LIMIT, truncating rows client-side");
        }
        let statement = limited.sql().to_string();

        self.sandboxed(timeout_ms, move |tx| {
            Box::pin(async move {
                let prepared = tx
                    .prepare(statement.as_str())
                    .await
                    .map_err(|e| OptimizeError::Query(format_postgres_error(&e)))?;
                let columns = prepared.columns().iter().map(|c| c.name().to_string()).collect();
                let rows = tx
                    .query(&prepared, &[])
                    .await
                    .map_err(|e| OptimizeError::Query(format_postgres_error(&e)))?;

                let rows = rows
                    .iter()
                    .take(row_limit)
                    .map(|row| (0..row.len()).map(|idx| postgres_to_value(row, idx)).collect())
                    .collect();
                Ok(QueryRows::new(columns, rows))
            })
        })
        .await
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the client ends the connection task once pending requests drain
        match tokio::time::timeout(PING_TIMEOUT, self.client.lock()).await {
            Ok(mut guard) => {
                guard.take();
                tracing::debug!(database = %self.database, "PostgreSQL connector closed");
            }
            Err(_) => tracing::warn!(database = %self.database, "timed out waiting to close PostgreSQL connector"),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
