//! Row diff to SQL.
//!
//! Statements are laid out one clause per line so the operator can read
//! them before confirming:
//!
//! ```text
//! UPDATE  orders
//!    SET  status = $1
//!  WHERE  id = $2
//!    AND  note IS NULL
//! ```

use crate::{ColumnRule, EditRow, RowChange};
use gridsql_core::{BoundParam, DialectEntry, PlaceholderBinder, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
}

/// A statement ready for confirmation, with its parameters in token order
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub kind: StatementKind,
    pub sql: String,
    pub params: Vec<BoundParam>,
}

/// Compiles edited rows of one table
pub struct DmlCompiler<'a> {
    /// Quoted when needed, as it appears in the generated SQL
    table: String,
    rules: &'a [ColumnRule],
    dialect: &'a DialectEntry,
    null: &'a str,
}

impl<'a> DmlCompiler<'a> {
    /// `rules` are in column order and carry the column names
    pub fn new(
        table: &'a str,
        rules: &'a [ColumnRule],
        dialect: &'a DialectEntry,
        null: &'a str,
    ) -> Self {
        Self {
            table: quote_ident(table),
            rules,
            dialect,
            null,
        }
    }

    /// `INSERT` for a new row, `UPDATE` for a modified one
    pub fn compile_row(&self, row: &EditRow) -> Result<Option<CompiledStatement>> {
        match row.classify() {
            RowChange::Unchanged => Ok(None),
            RowChange::New => self.insert(row).map(Some),
            RowChange::Modified => self.update(row).map(Some),
        }
    }

    /// `DELETE` for a removed row that existed in the database
    pub fn compile_removed(&self, row: &EditRow) -> Result<Option<CompiledStatement>> {
        if row.is_synthetic() {
            return Ok(None);
        }
        let mut binder = self.dialect.binder();
        let mut sql = format!("DELETE FROM {}", self.table);
        self.write_where(&mut sql, row, &mut binder)?;
        Ok(Some(CompiledStatement {
            kind: StatementKind::Delete,
            sql,
            params: binder.values(),
        }))
    }

    fn insert(&self, row: &EditRow) -> Result<CompiledStatement> {
        let mut binder = self.dialect.binder();
        let values = self
            .rules
            .iter()
            .zip(&row.cells)
            .map(|(rule, cell)| self.value_token(rule, cell.text(), &mut binder))
            .collect::<Result<Vec<_>>>()?;
        Ok(CompiledStatement {
            kind: StatementKind::Insert,
            sql: format!("INSERT INTO {} VALUES\n( {} )", self.table, values.join(",")),
            params: binder.values(),
        })
    }

    fn update(&self, row: &EditRow) -> Result<CompiledStatement> {
        let mut binder = self.dialect.binder();
        let mut sql = format!("UPDATE  {}", self.table);
        let mut separator = "\n   SET  ";
        for (rule, cell) in self.rules.iter().zip(&row.cells) {
            if !cell.modified() {
                continue;
            }
            let token = self.value_token(rule, cell.text(), &mut binder)?;
            sql.push_str(&format!("{}{} = {}", separator, quote_ident(rule.name()), token));
            separator = ",\n        ";
        }
        self.write_where(&mut sql, row, &mut binder)?;
        Ok(CompiledStatement {
            kind: StatementKind::Update,
            sql,
            params: binder.values(),
        })
    }

    /// Token for a value in `VALUES` or `SET`; NULL is always written literally
    fn value_token(
        &self,
        rule: &ColumnRule,
        text: &str,
        binder: &mut PlaceholderBinder,
    ) -> Result<String> {
        let value = rule.coerce(text)?;
        if value.is_null() {
            Ok("NULL".to_string())
        } else {
            Ok(binder.bind(value))
        }
    }

    /// Match every column against its original value
    fn write_where(
        &self,
        sql: &mut String,
        row: &EditRow,
        binder: &mut PlaceholderBinder,
    ) -> Result<()> {
        for (i, (rule, cell)) in self.rules.iter().zip(&row.cells).enumerate() {
            let keyword = if i == 0 { "\n WHERE  " } else { "\n   AND  " };
            let column = quote_ident(rule.name());
            let original = String::from_utf8_lossy(cell.original());
            if original == self.null {
                sql.push_str(&format!("{}{} IS NULL", keyword, column));
            } else {
                let value = rule.coerce(&original)?;
                let lhs = binder.column_for_where(&value, &column);
                sql.push_str(&format!("{}{} = {}", keyword, lhs, binder.bind(value)));
            }
        }
        Ok(())
    }
}

/// Double-quote identifiers that contain a space
fn quote_ident(name: &str) -> String {
    if name.contains(' ') {
        format!("\"{}\"", name.replace('"', "\"\""))
    } else {
        name.to_string()
    }
}
