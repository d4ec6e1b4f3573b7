//! Built-in dialect entries, one module per engine

mod mysql;
mod oracle;
mod postgres;
mod sqlite;
mod sqlserver;

pub use mysql::{mysql_dialect, mysql_dsn_filter};
pub use oracle::oracle_dialect;
pub use postgres::postgres_dialect;
pub use sqlite::sqlite_dialect;
pub use sqlserver::sqlserver_dialect;

use gridsql_core::{BoundValue, Result, Value, parse_any_datetime};

/// Converter shared by engines whose drivers bind temporal values natively
pub(crate) fn typed_instant(text: &str) -> Result<BoundValue> {
    let literal = parse_any_datetime(text)?;
    Ok(BoundValue::Plain(Value::DateTimeTz(literal.instant)))
}
