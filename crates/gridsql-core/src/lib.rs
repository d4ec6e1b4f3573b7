//! gridsql core - shared abstractions for the dialect-aware edit engine
//!
//! This crate provides the types every other gridsql crate depends on:
//!
//! - `Connection` / `Transaction` / `DatabaseDriver` - the driver boundary
//! - `Value`, `ColumnMeta`, `QueryResult` - fetched data
//! - `DialectEntry` - per-engine templates, converters and placeholder strategy
//! - `PlaceholderBinder` - ordered bind buffer rendering dialect tokens
//! - `parse_any_datetime` - the temporal literal grammar shared by all dialects

mod connection;
mod dialect;
mod driver;
mod error;
pub mod placeholder;
pub mod temporal;
pub mod text;
mod types;

pub use connection::*;
pub use dialect::*;
pub use driver::*;
pub use error::*;
pub use placeholder::{BoundParam, BoundValue, PlaceholderBinder, PlaceholderStyle};
pub use temporal::{TemporalKind, TemporalLiteral, parse_any_datetime};
pub use types::*;
