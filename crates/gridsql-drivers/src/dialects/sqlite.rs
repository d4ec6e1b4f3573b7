//! SQLite has no native temporal type, so temporal values are bound through
//! `datetime(?)`/`date(?)`/`time(?)` and compared through the same function.

use gridsql_core::text::first_keyword;
use gridsql_core::{
    BoundValue, DialectEntry, PlaceholderStyle, Result, TypeConverter, Value, parse_any_datetime,
};

const TABLE_QUERY: &str = "
    select 'master' AS schema,name,rootpage,sql FROM sqlite_master
     where type = 'table'
    union all
    select 'temp_schema' AS schema,name,rootpage,sql FROM sqlite_temp_schema
     where type = 'table'";

/// SQLite dialect
pub fn sqlite_dialect() -> DialectEntry {
    DialectEntry {
        name: "SQLITE3",
        usage: "gridsql sqlite3 :memory: OR <FILEPATH>",
        table_query: TABLE_QUERY,
        column_query: "PRAGMA table_info({table_name})",
        table_name_field: "name",
        column_name_field: "name",
        converter_for,
        placeholder: PlaceholderStyle::Numbered {
            prefix: "$",
            format: "v",
            named: true,
        },
        transaction_safe,
        query_statement,
        dsn_filter: None,
        display_datetime_layout: "%Y-%m-%d %H:%M:%S",
    }
}

fn converter_for(type_name: &str) -> Option<TypeConverter> {
    match type_name {
        "TIMESTAMP" | "DATETIME" => Some(as_datetime),
        "DATE" => Some(as_date),
        "TIME" => Some(as_time),
        _ => None,
    }
}

fn as_datetime(text: &str) -> Result<BoundValue> {
    Ok(templated("datetime(?)", text))
}

fn as_date(text: &str) -> Result<BoundValue> {
    Ok(templated("date(?)", text))
}

fn as_time(text: &str) -> Result<BoundValue> {
    Ok(templated("time(?)", text))
}

/// Unparseable text is stored as-is; SQLite accepts anything in any column
fn templated(template: &str, text: &str) -> BoundValue {
    match parse_any_datetime(text) {
        Ok(literal) => BoundValue::Templated {
            template: template.to_string(),
            value: Value::DateTimeTz(literal.instant),
        },
        Err(_) => BoundValue::Plain(Value::String(text.to_string())),
    }
}

fn transaction_safe(sql: &str) -> bool {
    first_keyword(sql) != "VACUUM"
}

fn query_statement(sql: &str) -> bool {
    first_keyword(sql) == "PRAGMA"
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("CREATE TABLE test (id INT);", true)]
    #[case("DROP TABLE test;", true)]
    #[case("ALTER TABLE test ADD COLUMN name TEXT;", true)]
    #[case("VACUUM;", false)]
    #[case("PRAGMA user_version = 1;", true)]
    fn test_transaction_safe(#[case] sql: &str, #[case] expected: bool) {
        assert_eq!(sqlite_dialect().is_transaction_safe(sql), expected);
    }

    #[test]
    fn test_pragma_is_query() {
        let dialect = sqlite_dialect();
        assert!(dialect.is_query("pragma table_info(t)"));
        assert!(!dialect.is_query("DELETE FROM t"));
    }

    #[test]
    fn test_datetime_is_templated() {
        let dialect = sqlite_dialect();
        let convert = dialect.type_converter("DATETIME").unwrap();
        let bound = convert("2024-05-25 13:45:33").unwrap();
        let mut binder = dialect.binder();
        binder.bind(Value::Int64(1));
        let column = binder.column_for_where(&bound, "created");
        let token = binder.bind(bound);
        assert_eq!(column, "datetime(created)");
        assert_eq!(token, "datetime($v2)");
    }

    #[test]
    fn test_unparseable_temporal_passes_through() {
        let convert = sqlite_dialect().type_converter("date").unwrap();
        assert_eq!(
            convert("someday").unwrap(),
            BoundValue::Plain(Value::String("someday".into()))
        );
    }
}
