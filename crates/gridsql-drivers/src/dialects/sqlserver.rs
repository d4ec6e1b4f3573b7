use gridsql_core::{
    DATETIME_TZ_LAYOUT, DialectEntry, PlaceholderStyle, TypeConverter, always_transaction_safe,
    never_query_statement,
};

use super::typed_instant;

const COLUMN_QUERY: &str = r#"
    select c.column_id as "ID",
           c.name as "NAME",
           case
             when c.max_length > 0 then
               t.name + '(' + convert(varchar,c.max_length) + ')'
             else
               t.name
           end as "TYPE",
           case c.is_nullable
             when 1 then 'NULL'
             else 'NOT NULL'
           end as "NULL?"
      from sys.columns c,
           sys.objects o,
           sys.types t
     where c.object_id = o.object_id
       and o.name = @p1
       and c.user_type_id = t.user_type_id
     order by c.column_id"#;

/// Microsoft SQL Server dialect
pub fn sqlserver_dialect() -> DialectEntry {
    DialectEntry {
        name: "SQLSERVER",
        usage: "gridsql sqlserver://@<HOSTNAME>?database=<DBNAME>",
        table_query: "select * from sys.tables",
        column_query: COLUMN_QUERY,
        table_name_field: "name",
        column_name_field: "name",
        converter_for,
        placeholder: PlaceholderStyle::Numbered {
            prefix: "@",
            format: "v",
            named: true,
        },
        transaction_safe: always_transaction_safe,
        query_statement: never_query_statement,
        dsn_filter: None,
        display_datetime_layout: DATETIME_TZ_LAYOUT,
    }
}

fn converter_for(type_name: &str) -> Option<TypeConverter> {
    match type_name {
        "SMALLDATETIME" | "DATETIME" | "DATETIME2" => Some(typed_instant),
        _ => None,
    }
}
