//! Dialect descriptors.
//!
//! A [`DialectEntry`] bundles everything engine-specific the edit engine
//! needs: introspection templates, the per-type literal converters, the
//! placeholder strategy and the predicates used by the raw-statement path.
//! Entries are plain data and never change once registered.

use crate::{
    BoundParam, BoundValue, Connection, GridsqlError, PlaceholderBinder, PlaceholderStyle, Result,
    Value,
};
use std::collections::HashSet;

/// Converts operator text into a value for one column type
pub type TypeConverter = fn(&str) -> Result<BoundValue>;

/// Marker substituted with the table name in column query templates
pub const TABLE_NAME_MARKER: &str = "{table_name}";

/// Per-engine SQL behavior
#[derive(Debug, Clone)]
pub struct DialectEntry {
    /// Canonical engine key, e.g. `POSTGRES`
    pub name: &'static str,
    /// Human help line showing how to connect
    pub usage: &'static str,
    /// Lists tables
    pub table_query: &'static str,
    /// Lists the columns of one table, either through [`TABLE_NAME_MARKER`]
    /// or a single bound parameter
    pub column_query: &'static str,
    /// Column of `table_query`'s result holding table names
    pub table_name_field: &'static str,
    /// Column of `column_query`'s result holding column names
    pub column_name_field: &'static str,
    /// Looks up a converter by normalized upper-case type name
    pub converter_for: fn(&str) -> Option<TypeConverter>,
    pub placeholder: PlaceholderStyle,
    /// Whether a raw statement may run inside an open transaction
    pub transaction_safe: fn(&str) -> bool,
    /// Whether a raw statement produces rows
    pub query_statement: fn(&str) -> bool,
    /// Rewrites the DSN before connecting
    pub dsn_filter: Option<fn(&str) -> Result<String>>,
    /// chrono layout for fetched temporal values shown in the grid
    pub display_datetime_layout: &'static str,
}

/// `transaction_safe` for dialects without restrictions
pub fn always_transaction_safe(_sql: &str) -> bool {
    true
}

/// `query_statement` for dialects where only SELECT returns rows
pub fn never_query_statement(_sql: &str) -> bool {
    false
}

/// `converter_for` for dialects without temporal converters
pub fn no_converters(_type_name: &str) -> Option<TypeConverter> {
    None
}

impl DialectEntry {
    /// Converter for a reported column type, if the dialect has one
    pub fn type_converter(&self, type_name: &str) -> Option<TypeConverter> {
        (self.converter_for)(&normalize_type_name(type_name))
    }

    /// Fresh binder for one statement
    pub fn binder(&self) -> PlaceholderBinder {
        self.placeholder.binder()
    }

    pub fn is_transaction_safe(&self, sql: &str) -> bool {
        (self.transaction_safe)(sql)
    }

    pub fn is_query(&self, sql: &str) -> bool {
        (self.query_statement)(sql)
    }

    /// Apply the dialect's DSN filter, if any
    pub fn filter_dsn(&self, dsn: &str) -> Result<String> {
        match self.dsn_filter {
            Some(filter) => filter(dsn),
            None => Ok(dsn.to_string()),
        }
    }

    /// Table names visible to `conn`
    #[tracing::instrument(skip(self, conn))]
    pub async fn tables(&self, conn: &dyn Connection) -> Result<Vec<String>> {
        query_one_column(conn, self.table_query, &[], self.table_name_field).await
    }

    /// Column names of `table`
    #[tracing::instrument(skip(self, conn))]
    pub async fn columns(&self, conn: &dyn Connection, table: &str) -> Result<Vec<String>> {
        let (sql, params) = self.column_query_for(table);
        query_one_column(conn, &sql, &params, self.column_name_field).await
    }

    /// Grid text for a fetched non-null value
    pub fn display_value(&self, value: &Value) -> String {
        match value {
            Value::DateTimeTz(instant) => instant.format(self.display_datetime_layout).to_string(),
            Value::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            other => other.to_string(),
        }
    }

    /// Column query text and parameters for `table`
    pub fn column_query_for(&self, table: &str) -> (String, Vec<BoundParam>) {
        if self.column_query.contains(TABLE_NAME_MARKER) {
            (self.column_query.replace(TABLE_NAME_MARKER, table), Vec::new())
        } else {
            (
                self.column_query.to_string(),
                vec![BoundParam::Positional(Value::String(table.to_string()))],
            )
        }
    }
}

/// Upper-case a reported type name and drop length/precision suffixes,
/// e.g. `timestamp(6) with time zone` -> `TIMESTAMP WITH TIME ZONE`
pub fn normalize_type_name(type_name: &str) -> String {
    let mut normalized = String::with_capacity(type_name.len());
    let mut depth = 0usize;
    for c in type_name.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => normalized.push(c.to_ascii_uppercase()),
            _ => {}
        }
    }
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Unique non-null values of `field` in first-seen order
async fn query_one_column(
    conn: &dyn Connection,
    sql: &str,
    params: &[BoundParam],
    field: &str,
) -> Result<Vec<String>> {
    let result = conn.query(sql, params).await?;
    let index = result
        .column_index(field)
        .ok_or_else(|| GridsqlError::ColumnNameNotFound(field.to_string()))?;

    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for row in &result.rows {
        match row.get(index) {
            None | Some(Value::Null) => continue,
            Some(value) => {
                let name = value.to_string();
                if seen.insert(name.clone()) {
                    names.push(name);
                }
            }
        }
    }
    tracing::debug!(field = %field, count = names.len(), "introspection query returned names");
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColumnMeta, QueryResult, Row, StatementResult, Transaction};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Connection returning a canned result and recording what it was asked
    struct Recorder {
        result: QueryResult,
        seen: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl Connection for Recorder {
        fn driver_name(&self) -> &str {
            "recorder"
        }

        async fn execute(&self, _sql: &str, _params: &[BoundParam]) -> Result<StatementResult> {
            Ok(StatementResult::default())
        }

        async fn query(&self, sql: &str, params: &[BoundParam]) -> Result<QueryResult> {
            self.seen.lock().unwrap().push((sql.to_string(), params.len()));
            Ok(self.result.clone())
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
    }

    fn entry(column_query: &'static str) -> DialectEntry {
        DialectEntry {
            name: "TEST",
            usage: "",
            table_query: "select * from tables",
            column_query,
            table_name_field: "table_name",
            column_name_field: "name",
            converter_for: no_converters,
            placeholder: PlaceholderStyle::Question,
            transaction_safe: always_transaction_safe,
            query_statement: never_query_statement,
            dsn_filter: None,
            display_datetime_layout: crate::DATETIME_TZ_LAYOUT,
        }
    }

    fn names_result(column: &str, values: &[Option<&str>]) -> QueryResult {
        let columns = vec![ColumnMeta {
            name: column.to_string(),
            data_type: "TEXT".into(),
            nullable: None,
            ordinal: 0,
        }];
        let names = vec![column.to_string()];
        let rows = values
            .iter()
            .map(|v| {
                let value = v.map_or(Value::Null, |s| Value::String(s.to_string()));
                Row::new(names.clone(), vec![value])
            })
            .collect();
        QueryResult {
            columns,
            rows,
            ..QueryResult::empty()
        }
    }

    #[test]
    fn test_normalize_type_name() {
        assert_eq!(normalize_type_name("varchar(20)"), "VARCHAR");
        assert_eq!(
            normalize_type_name("timestamp(6) with time zone"),
            "TIMESTAMP WITH TIME ZONE"
        );
        assert_eq!(normalize_type_name("DATETIME"), "DATETIME");
    }

    #[test]
    fn test_column_query_marker_vs_param() {
        let (sql, params) = entry("PRAGMA table_info({table_name})").column_query_for("t1");
        assert_eq!(sql, "PRAGMA table_info(t1)");
        assert!(params.is_empty());

        let (sql, params) = entry("select name from cols where t = ?").column_query_for("t1");
        assert_eq!(sql, "select name from cols where t = ?");
        assert_eq!(params, vec![BoundParam::Positional(Value::String("t1".into()))]);
    }

    #[tokio::test]
    async fn test_tables_are_unique_and_ordered() {
        let conn = Recorder {
            result: names_result("TABLE_NAME", &[Some("b"), Some("a"), None, Some("b")]),
            seen: Default::default(),
        };
        let tables = entry("").tables(&conn).await.unwrap();
        assert_eq!(tables, vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_field_is_reported() {
        let conn = Recorder {
            result: names_result("other", &[Some("x")]),
            seen: Default::default(),
        };
        let err = entry("cols ?").columns(&conn, "t1").await.unwrap_err();
        assert!(matches!(err, GridsqlError::ColumnNameNotFound(ref f) if f == "name"));
        assert_eq!(conn.seen.lock().unwrap()[0], ("cols ?".to_string(), 1));
    }
}
