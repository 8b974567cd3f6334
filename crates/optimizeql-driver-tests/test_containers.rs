//! Docker container management for the integration tests.
//!
//! The first test that asks for a dialect starts its container, seeds it from
//! `seed/<dialect>.sql` and caches the connection details; later tests reuse
//! the same container. Seeding needs write access, so it goes through the
//! raw client crates rather than the read-only connectors.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use std::time::Duration;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::{mysql::Mysql, postgres::Postgres};
use tokio::sync::Mutex;

const POSTGRES_SEED: &str = include_str!("seed/postgres.sql");
const MYSQL_SEED: &str = include_str!("seed/mysql.sql");
const MAX_CONNECT_ATTEMPTS: u32 = 10;

/// Connection details of a running, seeded container
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub host: String,
    /// Randomly assigned host port
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: Option<String>,
}

struct RunningContainer<I: testcontainers::Image> {
    #[allow(dead_code)]
    inner: ContainerAsync<I>,
    info: ContainerInfo,
}

static POSTGRES_CONTAINER: Lazy<Mutex<Option<RunningContainer<Postgres>>>> = Lazy::new(|| Mutex::new(None));

static MYSQL_CONTAINER: Lazy<Mutex<Option<RunningContainer<Mysql>>>> = Lazy::new(|| Mutex::new(None));

/// Statements of a seed script, split on `;` at end of line, comments dropped
pub fn seed_statements(script: &str) -> Vec<String> {
    script
        .split(";\n")
        .map(|chunk| {
            chunk
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .trim_end_matches(';')
                .to_string()
        })
        .filter(|statement| !statement.is_empty())
        .collect()
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(250 * 2u64.pow(attempt.min(4)))
}

async fn seed_postgres(info: &ContainerInfo) -> Result<()> {
    let password = info.password.as_deref().unwrap_or_default();
    let params = format!(
        "host={} port={} user={} password={} dbname={}",
        info.host, info.port, info.username, password, info.database
    );

    let mut attempt = 0;
    let client = loop {
        attempt += 1;
        match tokio_postgres::connect(&params, tokio_postgres::NoTls).await {
            Ok((client, connection)) => {
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::error!(error = %e, "seed connection error");
                    }
                });
                break client;
            }
            Err(e) if attempt < MAX_CONNECT_ATTEMPTS => {
                tracing::warn!(attempt, error = %e, "PostgreSQL not ready, retrying");
                tokio::time::sleep(backoff(attempt)).await;
            }
            Err(e) => return Err(e).context("PostgreSQL container never accepted connections"),
        }
    };

    for statement in seed_statements(POSTGRES_SEED) {
        client
            .batch_execute(&statement)
            .await
            .with_context(|| format!("seed statement failed: {}", statement))?;
    }
    tracing::info!(port = info.port, "PostgreSQL container seeded");
    Ok(())
}

async fn seed_mysql(info: &ContainerInfo) -> Result<()> {
    use mysql_async::prelude::Queryable;

    let opts = mysql_async::OptsBuilder::default()
        .ip_or_hostname(info.host.as_str())
        .tcp_port(info.port)
        .user(Some(info.username.as_str()))
        .pass(info.password.as_deref())
        .db_name(Some(info.database.as_str()));

    let mut attempt = 0;
    let mut conn = loop {
        attempt += 1;
        match mysql_async::Conn::new(opts.clone()).await {
            Ok(conn) => break conn,
            Err(e) if attempt < MAX_CONNECT_ATTEMPTS => {
                tracing::warn!(attempt, error = %e, "MySQL not ready, retrying");
                tokio::time::sleep(backoff(attempt)).await;
            }
            Err(e) => return Err(e).context("MySQL container never accepted connections"),
        }
    };

    for statement in seed_statements(MYSQL_SEED) {
        conn.query_drop(statement.as_str())
            .await
            .with_context(|| format!("seed statement failed: {}", statement))?;
    }
    conn.disconnect().await.context("failed to close MySQL seed connection")?;
    tracing::info!(port = info.port, "MySQL container seeded");
    Ok(())
}

/// Start (once) and return the seeded PostgreSQL container
pub async fn postgres_container() -> Result<ContainerInfo> {
    let mut guard = POSTGRES_CONTAINER.lock().await;
    if let Some(container) = guard.as_ref() {
        return Ok(container.info.clone());
    }

    tracing::info!("starting PostgreSQL test container");
    let container = Postgres::default()
        .start()
        .await
        .context("failed to start postgres container")?;
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .context("failed to get postgres port")?;

    // testcontainers-modules defaults
    let info = ContainerInfo {
        host: "127.0.0.1".to_string(),
        port,
        database: "postgres".to_string(),
        username: "postgres".to_string(),
        password: Some("postgres".to_string()),
    };
    seed_postgres(&info).await?;

    *guard = Some(RunningContainer {
        inner: container,
        info: info.clone(),
    });
    Ok(info)
}

/// Start (once) and return the seeded MySQL container
pub async fn mysql_container() -> Result<ContainerInfo> {
    let mut guard = MYSQL_CONTAINER.lock().await;
    if let Some(container) = guard.as_ref() {
        return Ok(container.info.clone());
    }

    tracing::info!("starting MySQL test container");
    let container = Mysql::default()
        .start()
        .await
        .context("failed to start mysql container")?;
    let port = container
        .get_host_port_ipv4(3306)
        .await
        .context("failed to get mysql port")?;

    // testcontainers-modules defaults: passwordless root, database `test`
    let info = ContainerInfo {
        host: "127.0.0.1".to_string(),
        port,
        database: "test".to_string(),
        username: "root".to_string(),
        password: None,
    };
    seed_mysql(&info).await?;

    *guard = Some(RunningContainer {
        inner: container,
        info: info.clone(),
    });
    Ok(info)
}
