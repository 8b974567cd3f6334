//! MySQL connector for optimizeql
//!
//! Sessions are opened read-only and every statement runs inside a
//! `READ ONLY` transaction that is rolled back afterwards.

mod catalog;
mod connector;
mod values;

pub use connector::MySqlConnector;
