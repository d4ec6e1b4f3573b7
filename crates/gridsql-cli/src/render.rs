//! Table rendering for query results and the grid editor

use chrono::{DateTime, Local};
use comfy_table::{Table, presets};
use gridsql_core::{DialectEntry, QueryResult, Value};

fn new_table(headers: impl IntoIterator<Item = String>) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::ASCII_FULL_CONDENSED);
    table.set_header(headers);
    table
}

/// Render a query result, showing NULL as `null`
pub fn render_result(result: &QueryResult, dialect: &DialectEntry, null: &str) -> String {
    let mut table = new_table(result.columns.iter().map(|c| c.name.clone()));
    for row in &result.rows {
        table.add_row(row.values.iter().map(|value| match value {
            Value::Null => null.to_string(),
            other => dialect.display_value(other),
        }));
    }
    format!("{}\n{} row(s) selected.\n", table, result.row_count())
}

/// Render grid rows with a leading 1-based row number column
pub fn render_grid<'a>(
    headers: &[String],
    rows: impl IntoIterator<Item = &'a [String]>,
) -> String {
    let mut table = new_table(std::iter::once("#".to_string()).chain(headers.iter().cloned()));
    for (i, row) in rows.into_iter().enumerate() {
        table.add_row(std::iter::once((i + 1).to_string()).chain(row.iter().cloned()));
    }
    format!("{}\n", table)
}

/// Render the statement history, numbered from 0, with local timestamps
pub fn render_history(entries: &[(DateTime<Local>, String)]) -> String {
    let headers = ["#", "time", "statement"].map(String::from);
    let mut table = new_table(headers);
    for (i, (stamp, text)) in entries.iter().enumerate() {
        table.add_row([
            i.to_string(),
            stamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            text.clone(),
        ]);
    }
    format!("{}\n", table)
}
