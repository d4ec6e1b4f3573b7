use gridsql_core::{
    BoundValue, DATETIME_TZ_LAYOUT, DialectEntry, PlaceholderStyle, Result, TypeConverter, Value,
    always_transaction_safe, never_query_statement, parse_any_datetime,
};

use super::typed_instant;

const TABLE_QUERY: &str = "
        select * from information_schema.tables
         where table_type = 'BASE TABLE'
           and table_schema
        not in ('mysql', 'information_schema', 'performance_schema', 'sys')";

const COLUMN_QUERY: &str = r#"
        select ordinal_position as "ID",
               column_name as "NAME",
               case
                 when character_maximum_length is not null then
                      concat(data_type,'(',character_maximum_length,')')
                 when datetime_precision is not null then
                      concat(data_type,'(',datetime_precision,')')
                 else data_type
               end as "TYPE",
               case is_nullable
                 when "YES" then 'NULL'
                 else 'NOT NULL'
               end as "NULL?"
          from information_schema.columns
         where table_name = ?
         order by ordinal_position"#;

/// MySQL dialect
pub fn mysql_dialect() -> DialectEntry {
    DialectEntry {
        name: "MYSQL",
        usage: "gridsql mysql <USERNAME>:<PASSWORD>@/<DBNAME>",
        table_query: TABLE_QUERY,
        column_query: COLUMN_QUERY,
        table_name_field: "TABLE_NAME",
        column_name_field: "NAME",
        converter_for,
        placeholder: PlaceholderStyle::Question,
        transaction_safe: always_transaction_safe,
        query_statement: never_query_statement,
        dsn_filter: Some(mysql_dsn_filter),
        display_datetime_layout: DATETIME_TZ_LAYOUT,
    }
}

fn converter_for(type_name: &str) -> Option<TypeConverter> {
    match type_name {
        "TIME" => Some(time_of_day),
        "DATETIME" | "TIMESTAMP" | "DATE" => Some(typed_instant),
        _ => None,
    }
}

/// TIME columns take the bare time of day
fn time_of_day(text: &str) -> Result<BoundValue> {
    let literal = parse_any_datetime(text)?;
    Ok(BoundValue::Plain(Value::String(literal.time_of_day())))
}

/// Ensure `parseTime=true` and `loc=Local` so temporal columns round-trip.
///
/// Existing parameters keep their order; the defaults are appended only when
/// missing.
pub fn mysql_dsn_filter(dsn: &str) -> Result<String> {
    let (base, query) = match dsn.split_once('?') {
        Some((base, query)) => (base, query),
        None => (dsn, ""),
    };
    let mut pairs: Vec<(String, String)> = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    for (key, default) in [("parseTime", "true"), ("loc", "Local")] {
        if !pairs.iter().any(|(k, _)| k == key) {
            pairs.push((key.to_string(), default.to_string()));
        }
    }
    let query = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    Ok(format!("{}?{}", base, query))
}
