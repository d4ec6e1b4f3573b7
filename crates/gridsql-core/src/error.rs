//! Error types for gridsql

use thiserror::Error;

/// Core error type for gridsql operations
#[derive(Error, Debug)]
pub enum GridsqlError {
    #[error("Connection error: {0}")]
    Connection(String),

    /// Opaque passthrough of a driver-side query/exec failure
    #[error("Query error: {0}")]
    Query(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("not time format: {0:?}")]
    NotTimeFormat(String),

    #[error("{column}: {reason}")]
    ColumnCoercionFailed { column: String, reason: String },

    #[error("{0}: column name not found")]
    ColumnNameNotFound(String),

    #[error("no rows affected")]
    NoRowsAffected,

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cancelled")]
    Cancelled,
}

impl GridsqlError {
    /// Build a coercion failure for `column`
    pub fn coercion(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ColumnCoercionFailed {
            column: column.into(),
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias for gridsql operations
pub type Result<T> = std::result::Result<T, GridsqlError>;
