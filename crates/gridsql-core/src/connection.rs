//! Connection trait and transaction handling

use crate::{BoundParam, GridsqlError, QueryResult, Result, StatementResult};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Interrupts whatever statement is running on a connection.
///
/// Safe to call from any thread; a call with nothing running is a no-op.
pub trait QueryCancelHandle: Send + Sync {
    fn cancel(&self);
}

/// A database connection
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite", "postgres")
    fn driver_name(&self) -> &str;

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE)
    async fn execute(&self, sql: &str, params: &[BoundParam]) -> Result<StatementResult>;

    /// Execute a query that returns rows
    async fn query(&self, sql: &str, params: &[BoundParam]) -> Result<QueryResult>;

    /// Begin a transaction
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;

    /// Handle that interrupts a running statement.
    ///
    /// Returns `None` when the driver cannot interrupt calls.
    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        None
    }
}

/// A database transaction
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;

    /// Execute a query within the transaction
    async fn query(&self, sql: &str, params: &[BoundParam]) -> Result<QueryResult>;

    /// Execute a statement within the transaction
    async fn execute(&self, sql: &str, params: &[BoundParam]) -> Result<StatementResult>;
}

/// Race a database call on `conn` against `token`.
///
/// Cancellation wins ties and surfaces as [`GridsqlError::Cancelled`]. The
/// running statement is interrupted through the connection's cancel handle
/// and the call is never retried.
pub async fn with_cancel<T, F>(
    token: &CancellationToken,
    conn: &dyn Connection,
    call: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            if let Some(handle) = conn.cancel_handle() {
                tracing::debug!(driver = conn.driver_name(), "interrupting running statement");
                handle.cancel();
            }
            Err(GridsqlError::Cancelled)
        }
        result = call => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoundParam, QueryResult, StatementResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Connection whose calls never finish on their own
    #[derive(Default)]
    struct StuckConnection {
        interrupts: Arc<AtomicUsize>,
    }

    struct CountingHandle(Arc<AtomicUsize>);

    impl QueryCancelHandle for CountingHandle {
        fn cancel(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Connection for StuckConnection {
        fn driver_name(&self) -> &str {
            "stuck"
        }

        async fn execute(&self, _: &str, _: &[BoundParam]) -> Result<StatementResult> {
            std::future::pending().await
        }

        async fn query(&self, _: &str, _: &[BoundParam]) -> Result<QueryResult> {
            std::future::pending().await
        }

        async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
            Err(GridsqlError::NotSupported("transactions".into()))
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            false
        }

        fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
            Some(Arc::new(CountingHandle(Arc::clone(&self.interrupts))))
        }
    }

    #[tokio::test]
    async fn test_with_cancel_passes_result_through() {
        let token = CancellationToken::new();
        let conn = StuckConnection::default();
        let value = with_cancel(&token, &conn, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(conn.interrupts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_with_cancel_returns_cancelled_and_interrupts() {
        let token = CancellationToken::new();
        let conn = StuckConnection::default();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let result = with_cancel(&token, &conn, conn.query("SELECT 1", &[])).await;
        assert!(matches!(result, Err(GridsqlError::Cancelled)));
        assert_eq!(conn.interrupts.load(Ordering::SeqCst), 1);
    }
}
