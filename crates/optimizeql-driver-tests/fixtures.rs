//! Fixtures for running one test body against every supported dialect.
//!
//! ```rust,ignore
//! use optimizeql_driver_tests::fixtures::{TestDriver, test_connector};
//! use rstest::rstest;
//!
//! #[rstest]
//! #[case::postgres(TestDriver::Postgres)]
//! #[case::mysql(TestDriver::Mysql)]
//! #[tokio::test]
//! #[ignore = "requires Docker"]
//! async fn test_ping(#[case] driver: TestDriver) -> anyhow::Result<()> {
//!     let connector = test_connector(driver).await?;
//!     assert!(connector.test_connection().await);
//!     connector.close().await;
//!     Ok(())
//! }
//! ```

use anyhow::{Context, Result};
use optimizeql_core::{ConnectionConfig, Connector, Dialect};

use crate::test_containers::{ContainerInfo, mysql_container, postgres_container};

/// Test driver identifier for parameterized testing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestDriver {
    Postgres,
    Mysql,
}

impl TestDriver {
    pub fn name(&self) -> &'static str {
        self.dialect().tag()
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            TestDriver::Postgres => Dialect::Postgresql,
            TestDriver::Mysql => Dialect::Mysql,
        }
    }

    /// A statement that runs for about `seconds` seconds
    pub fn sleep_sql(&self, seconds: u32) -> String {
        match self {
            TestDriver::Postgres => format!("SELECT pg_sleep({})", seconds),
            TestDriver::Mysql => format!("SELECT SLEEP({})", seconds),
        }
    }
}

pub fn all_drivers() -> Vec<TestDriver> {
    vec![TestDriver::Postgres, TestDriver::Mysql]
}

async fn container(driver: TestDriver) -> Result<ContainerInfo> {
    match driver {
        TestDriver::Postgres => postgres_container().await,
        TestDriver::Mysql => mysql_container().await,
    }
}

/// Connection parameters for the seeded container of `driver`
pub async fn connection_config(driver: TestDriver) -> Result<ConnectionConfig> {
    initialize_logging();
    let info = container(driver).await?;

    let mut config = ConnectionConfig::new(driver.dialect(), &info.host);
    config.port = info.port;
    config.database = Some(info.database);
    config.username = Some(info.username);
    config.password = info.password;
    Ok(config)
}

/// An open, read-only connector to the seeded container of `driver`
pub async fn test_connector(driver: TestDriver) -> Result<Box<dyn Connector>> {
    let config = connection_config(driver).await?;
    optimizeql_drivers::open_connector(&config)
        .await
        .with_context(|| format!("failed to open {} connector", driver.name()))
}

fn initialize_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("info,optimizeql=debug,optimizeql_driver_tests=debug")
        });
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
