//! optimizeql drivers - connector implementations and their lifecycle
//!
//! Each supported engine lives in its own crate behind a feature flag;
//! this crate picks the right one for a `ConnectionConfig` and guarantees
//! the connector is closed when the caller is done with it.

#[cfg(feature = "mysql")]
pub use optimizeql_driver_mysql as mysql;
#[cfg(feature = "postgres")]
pub use optimizeql_driver_postgres as postgres;

mod factory;

pub use factory::{open_connector, scoped, test_connection, with_connector};

/// Re-export commonly used types from optimizeql-core
pub use optimizeql_core::{ConnectionConfig, Connector, Dialect, OptimizeError, Result};
