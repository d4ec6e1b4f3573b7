//! SQLite driver implementation

use async_trait::async_trait;
use gridsql_core::{Connection, DatabaseDriver, GridsqlError, Result};
use std::sync::Arc;

use crate::SqliteConnection;

/// SQLite database driver
pub struct SqliteDriver;

impl SqliteDriver {
    /// Create a new SQLite driver instance
    pub fn new() -> Self {
        tracing::debug!("SQLite driver initialized");
        Self
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for SqliteDriver {
    fn name(&self) -> &'static str {
        "SQLITE3"
    }

    #[tracing::instrument(skip(self))]
    async fn connect(&self, dsn: &str) -> Result<Arc<dyn Connection>> {
        let conn = SqliteConnection::open(dsn).map_err(|e| {
            tracing::error!(error = %e, "failed to connect to SQLite database");
            match e {
                GridsqlError::Connection(_) => e,
                other => GridsqlError::Connection(other.to_string()),
            }
        })?;
        Ok(Arc::new(conn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsql_core::Value;

    #[tokio::test]
    async fn test_connect_memory() {
        let driver = SqliteDriver::new();
        assert_eq!(driver.name(), "SQLITE3");
        let conn = driver.connect("sqlite3::memory:").await.unwrap();
        let result = conn.query("SELECT 1 + 1", &[]).await.unwrap();
        assert_eq!(result.rows[0].get(0), Some(&Value::Int64(2)));
    }
}
