//! Dialect and driver registries

use crate::dialects;
use gridsql_core::{Connection, DatabaseDriver, DialectEntry, GridsqlError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolved connection target
#[derive(Debug, Clone)]
pub struct DbInfo {
    /// Canonical engine key of the dialect
    pub engine: String,
    /// DSN after the dialect's filter
    pub dsn: String,
    pub dialect: Arc<DialectEntry>,
}

/// Registry of dialects keyed by upper-cased engine name or alias
pub struct DialectRegistry {
    dialects: HashMap<String, Arc<DialectEntry>>,
    order: Vec<String>,
}

impl DialectRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            dialects: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Create a registry with every built-in dialect and its aliases
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let builtin = [
            dialects::oracle_dialect(),
            dialects::postgres_dialect(),
            dialects::mysql_dialect(),
            dialects::sqlserver_dialect(),
            dialects::sqlite_dialect(),
        ];
        for entry in builtin {
            let entry = Arc::new(entry);
            let aliases: &[&str] = match entry.name {
                "POSTGRES" => &["POSTGRESQL"],
                "SQLSERVER" => &["MSSQL"],
                "SQLITE3" => &["SQLITE"],
                _ => &[],
            };
            let names = std::iter::once(entry.name).chain(aliases.iter().copied());
            for name in names {
                if let Err(err) = registry.register(name, Arc::clone(&entry)) {
                    tracing::warn!(%err, "skipping built-in dialect");
                }
            }
        }
        registry
    }

    /// Register `entry` under `name`; names are unique case-insensitively
    pub fn register(&mut self, name: &str, entry: Arc<DialectEntry>) -> Result<()> {
        let key = name.to_ascii_uppercase();
        if self.dialects.contains_key(&key) {
            return Err(GridsqlError::Configuration(format!(
                "dialect already registered: {}",
                key
            )));
        }
        tracing::info!(dialect = %key, engine = %entry.name, "registering dialect");
        self.order.push(key.clone());
        self.dialects.insert(key, entry);
        Ok(())
    }

    /// Get a dialect by name, ignoring case
    pub fn get(&self, name: &str) -> Option<Arc<DialectEntry>> {
        let entry = self.dialects.get(&name.to_ascii_uppercase()).cloned();
        if entry.is_none() {
            tracing::debug!(dialect = %name, "dialect not found in registry");
        }
        entry
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Check if a dialect is registered
    pub fn has(&self, name: &str) -> bool {
        self.dialects.contains_key(&name.to_ascii_uppercase())
    }

    /// Resolve command-line arguments into a connection target.
    ///
    /// Accepts either `<engine> <dsn...>` or a single DSN whose `scheme:`
    /// names the engine, in which case the whole argument list is the DSN.
    pub fn find_from_args(&self, args: &[String]) -> Result<DbInfo> {
        let Some(first) = args.first() else {
            return Err(GridsqlError::Configuration("too few arguments".into()));
        };

        let (dialect, dsn) = if let Some(dialect) = self.get(first) {
            if args.len() < 2 {
                return Err(GridsqlError::Configuration(
                    "DSN String is not specified".into(),
                ));
            }
            (dialect, args[1..].join(" "))
        } else {
            let dialect = first
                .split_once(':')
                .and_then(|(scheme, _)| self.get(scheme))
                .ok_or_else(|| {
                    tracing::warn!(arg = %first, "no dialect matches arguments");
                    GridsqlError::NotFound(format!("support driver not found: {}", first))
                })?;
            (dialect, args.join(" "))
        };

        let dsn = dialect.filter_dsn(&dsn)?;
        Ok(DbInfo {
            engine: dialect.name.to_string(),
            dsn,
            dialect,
        })
    }
}

impl Default for DialectRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Registry of linked connection drivers keyed by engine
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn DatabaseDriver>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Create a registry with all linked drivers registered
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "sqlite")]
        registry.register(Arc::new(crate::sqlite::SqliteDriver::new()));

        registry
    }

    /// Register a new driver
    pub fn register(&mut self, driver: Arc<dyn DatabaseDriver>) {
        let name = driver.name().to_ascii_uppercase();
        tracing::info!(driver = %name, "registering database driver");
        self.drivers.insert(name, driver);
    }

    /// Get a driver by engine name
    pub fn get(&self, engine: &str) -> Option<Arc<dyn DatabaseDriver>> {
        let driver = self.drivers.get(&engine.to_ascii_uppercase()).cloned();
        if driver.is_none() {
            tracing::warn!(driver = %engine, "driver not found in registry");
        }
        driver
    }

    /// List all registered driver names
    pub fn list(&self) -> Vec<&str> {
        self.drivers.keys().map(|s| s.as_str()).collect()
    }

    /// Check if a driver is registered
    pub fn has(&self, engine: &str) -> bool {
        self.drivers.contains_key(&engine.to_ascii_uppercase())
    }

    /// Open a connection for a resolved target
    #[tracing::instrument(skip(self, info), fields(engine = %info.engine))]
    pub async fn connect(&self, info: &DbInfo) -> Result<Arc<dyn Connection>> {
        let driver = self.get(&info.engine).ok_or_else(|| {
            GridsqlError::NotSupported(format!("{}: no driver linked", info.engine))
        })?;
        let conn = driver.connect(&info.dsn).await?;
        tracing::info!(engine = %info.engine, "connected");
        Ok(conn)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
