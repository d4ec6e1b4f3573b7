use gridsql_core::{
    DATETIME_TZ_LAYOUT, DialectEntry, PlaceholderStyle, TypeConverter, always_transaction_safe,
    never_query_statement,
};

use super::typed_instant;

const COLUMN_QUERY: &str = r#"
  select column_id as "ID",
         column_name as "NAME",
         case
           when data_type = 'NUMBER' then data_type
           when data_type = 'DATE' then data_type
           when data_type like 'TIMESTAMP%' then data_type
           else data_type || '(' || data_length || ')'
         end as "TYPE",
         case
           when nullable = 'Y' THEN 'NULL'
           else 'NOT NULL'
         end as "NULL?"
    from all_tab_columns
   where table_name = UPPER(:1)
   order by column_id"#;

/// Oracle dialect
pub fn oracle_dialect() -> DialectEntry {
    DialectEntry {
        name: "ORACLE",
        usage: "gridsql oracle://<USERNAME>:<PASSWORD>@<HOSTNAME>:<PORT>/<SERVICE>",
        table_query: "select * from tab where tname not like 'BIN$%'",
        column_query: COLUMN_QUERY,
        table_name_field: "tname",
        column_name_field: "name",
        converter_for,
        placeholder: PlaceholderStyle::Numbered {
            prefix: ":",
            format: "v",
            named: true,
        },
        transaction_safe: always_transaction_safe,
        query_statement: never_query_statement,
        dsn_filter: None,
        display_datetime_layout: DATETIME_TZ_LAYOUT,
    }
}

// Binds are typed, so no TO_DATE/TO_TIMESTAMP wrapping
fn converter_for(type_name: &str) -> Option<TypeConverter> {
    if type_name == "DATE" || type_name.starts_with("TIMESTAMP") {
        Some(typed_instant)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsql_core::Value;

    #[test]
    fn test_named_colon_placeholders() {
        let mut binder = oracle_dialect().binder();
        assert_eq!(binder.bind(Value::Int64(1)), ":v1");
        assert_eq!(binder.bind(Value::Int64(2)), ":v2");
        let params = binder.values();
        assert_eq!(params[1].name(), Some("v2"));
    }

    #[test]
    fn test_timestamp_variants_have_converters() {
        let dialect = oracle_dialect();
        assert!(dialect.type_converter("DATE").is_some());
        assert!(dialect.type_converter("TIMESTAMP(6) WITH LOCAL TIME ZONE").is_some());
        assert!(dialect.type_converter("VARCHAR2").is_none());
    }
}
