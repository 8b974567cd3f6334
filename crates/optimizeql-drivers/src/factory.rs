use futures::FutureExt;
use futures::future::BoxFuture;
use optimizeql_core::{ConnectionConfig, Connector, Dialect, OptimizeError, Result};
use std::panic::AssertUnwindSafe;

/// Open a connector for `config.dialect`
pub async fn open_connector(config: &ConnectionConfig) -> Result<Box<dyn Connector>> {
    tracing::debug!(dialect = %config.dialect, host = %config.host, "opening connector");
    match config.dialect {
        #[cfg(feature = "postgres")]
        Dialect::Postgresql => Ok(Box::new(crate::postgres::PostgresConnector::connect(config).await?)),
        #[cfg(feature = "mysql")]
        Dialect::Mysql => Ok(Box::new(crate::mysql::MySqlConnector::connect(config).await?)),
        #[allow(unreachable_patterns)]
        other => Err(OptimizeError::NotSupported(format!(
            "{} support was not compiled in",
            other.display_name()
        ))),
    }
}

/// Run `f` against an already open connector, then close it.
///
/// The connector is closed on success, on error and when `f` panics; a
/// panic is re-raised once the connection has been released.
pub async fn scoped<T, F>(connector: Box<dyn Connector>, f: F) -> Result<T>
where
    F: for<'c> FnOnce(&'c dyn Connector) -> BoxFuture<'c, Result<T>>,
{
    let outcome = AssertUnwindSafe(f(connector.as_ref())).catch_unwind().await;
    connector.close().await;
    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Open a connector for `config`, run `f`, and always close it afterwards
pub async fn with_connector<T, F>(config: &ConnectionConfig, f: F) -> Result<T>
where
    F: for<'c> FnOnce(&'c dyn Connector) -> BoxFuture<'c, Result<T>>,
{
    let connector = open_connector(config).await?;
    scoped(connector, f).await
}

/// Connect, ping and disconnect. Any failure, including connecting, is `false`.
pub async fn test_connection(config: &ConnectionConfig) -> bool {
    let outcome = with_connector(config, |connector| {
        Box::pin(async move { Ok(connector.test_connection().await) })
    })
    .await;

    match outcome {
        Ok(reachable) => reachable,
        Err(e) => {
            tracing::warn!(dialect = %config.dialect, host = %config.host, error = %e, "connection test failed");
            false
        }
    }
}
