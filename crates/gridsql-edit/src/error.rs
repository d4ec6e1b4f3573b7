//! Error types for the edit engine

use gridsql_core::GridsqlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditError {
    #[error(transparent)]
    Database(#[from] GridsqlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transaction is not closed. Please Commit or Rollback")]
    TransactionOpen,

    #[error("grid: {0}")]
    Grid(String),

    #[error("key input: {0}")]
    KeySource(String),
}

impl EditError {
    /// Whether the operator interrupted the running statement
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Database(e) if e.is_cancelled())
    }
}

pub type Result<T> = std::result::Result<T, EditError>;
