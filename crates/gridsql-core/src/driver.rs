//! Database driver trait definition

use crate::{Connection, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// A database driver that can open connections from a DSN
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Get the driver name, matching the engine key it serves (e.g., "SQLITE3")
    fn name(&self) -> &'static str;

    /// Open a connection using an already-filtered DSN
    async fn connect(&self, dsn: &str) -> Result<Arc<dyn Connection>>;
}
