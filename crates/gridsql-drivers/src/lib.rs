//! gridsql drivers - built-in dialects and the registries that resolve them
//!
//! Every engine gets a full [`DialectEntry`](gridsql_core::DialectEntry);
//! only engines whose driver crate is enabled can actually be connected to.

#[cfg(feature = "sqlite")]
pub use gridsql_driver_sqlite as sqlite;

pub mod dialects;
mod registry;

pub use registry::{DbInfo, DialectRegistry, DriverRegistry};

/// Re-export commonly used types from gridsql-core
pub use gridsql_core::{
    BoundParam, Connection, DatabaseDriver, DialectEntry, GridsqlError, QueryResult, Result,
    StatementResult, Transaction, Value,
};
