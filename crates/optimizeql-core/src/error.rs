//! Error types for optimizeql

use thiserror::Error;

/// Core error type for optimizeql operations
#[derive(Error, Debug)]
pub enum OptimizeError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    /// The statement could not be planned, was cancelled by the engine-side
    /// timeout, or failed while running under EXPLAIN ANALYZE.
    #[error("Plan execution error: {0}")]
    PlanExecution(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Result type alias for optimizeql operations
pub type Result<T> = std::result::Result<T, OptimizeError>;
