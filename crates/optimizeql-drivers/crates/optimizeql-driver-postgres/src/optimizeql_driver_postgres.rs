//! PostgreSQL connector for optimizeql

mod catalog;
mod connector;
mod values;

pub use connector::PostgresConnector;
