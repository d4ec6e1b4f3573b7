use gridsql_core::text::{cut_field, first_keyword};
use gridsql_core::{
    DATETIME_TZ_LAYOUT, DialectEntry, PlaceholderStyle, TypeConverter, never_query_statement,
};

use super::typed_instant;

const TABLE_QUERY: &str = "
      select *
        from information_schema.tables
       where table_type = 'BASE TABLE'
         and table_schema not in ('pg_catalog', 'information_schema')";

const COLUMN_QUERY: &str = r#"
      select a.attnum as "ID",
             a.attname as "NAME",
             case
               when t.typname = 'varchar' then 'varchar(' || ( a.atttypmod - 4 )  || ')'
               when a.atttypmod >= 0 then t.typname || '(' || a.atttypmod || ')'
               else t.typname
             end as "TYPE",
             case
               when a.attnotnull then 'NOT NULL'
               else 'NULL'
             end as "NULL?"
        from pg_attribute a, pg_class c, pg_type t
       where a.attrelid = c.oid
         and c.relname = $1
         and a.attnum > 0
         and t.oid = a.atttypid
         and a.attisdropped is false
       order by a.attnum"#;

/// PostgreSQL dialect
pub fn postgres_dialect() -> DialectEntry {
    DialectEntry {
        name: "POSTGRES",
        usage: "gridsql postgres://<USERNAME>:<PASSWORD>@<HOSTNAME>:<PORT>/<DBNAME>?sslmode=disable",
        table_query: TABLE_QUERY,
        column_query: COLUMN_QUERY,
        table_name_field: "table_name",
        column_name_field: "name",
        converter_for,
        placeholder: PlaceholderStyle::Numbered {
            prefix: "$",
            format: "",
            named: false,
        },
        transaction_safe,
        query_statement: never_query_statement,
        dsn_filter: None,
        display_datetime_layout: DATETIME_TZ_LAYOUT,
    }
}

fn converter_for(type_name: &str) -> Option<TypeConverter> {
    match type_name {
        "TIMESTAMPTZ"
        | "TIMESTAMP"
        | "DATE"
        | "TIMETZ"
        | "TIME"
        | "TIMESTAMP WITH TIME ZONE"
        | "TIMESTAMP WITHOUT TIME ZONE"
        | "TIME WITH TIME ZONE"
        | "TIME WITHOUT TIME ZONE" => Some(typed_instant),
        _ => None,
    }
}

fn transaction_safe(sql: &str) -> bool {
    match first_keyword(sql).as_str() {
        "VACUUM" | "REINDEX" | "CLUSTER" => false,
        "CREATE" | "DROP" => {
            let (_, rest) = cut_field(sql);
            let object = first_keyword(rest);
            object != "DATABASE" && object != "TABLESPACE"
        }
        _ => true,
    }
}
