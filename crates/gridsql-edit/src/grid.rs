//! The boundary to the spreadsheet provider and the row diff model

use crate::{ColumnRule, Result};

/// One cell after editing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditCell {
    original: Vec<u8>,
    text: String,
    modified: bool,
}

impl EditCell {
    /// A fetched cell the operator did not touch
    pub fn fetched(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            original: text.clone().into_bytes(),
            text,
            modified: false,
        }
    }

    /// A fetched cell whose text was replaced
    pub fn changed(original: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            original: original.into().into_bytes(),
            text: text.into(),
            modified: true,
        }
    }

    /// A cell of a row that did not exist in the database
    pub fn added(text: impl Into<String>) -> Self {
        Self {
            original: Vec::new(),
            text: text.into(),
            modified: true,
        }
    }

    /// Text as fetched; empty when the row is new
    pub fn original(&self) -> &[u8] {
        &self.original
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn modified(&self) -> bool {
        self.modified
    }

    /// Replace the text, keeping the original
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.modified = true;
    }
}

/// How a row differs from what was fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    New,
    Modified,
    Unchanged,
}

/// One row after editing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRow {
    pub cells: Vec<EditCell>,
}

impl EditRow {
    pub fn new(cells: Vec<EditCell>) -> Self {
        Self { cells }
    }

    /// Row of untouched fetched cells
    pub fn fetched<S: AsRef<str>>(texts: &[S]) -> Self {
        Self::new(texts.iter().map(|t| EditCell::fetched(t.as_ref())).collect())
    }

    pub fn classify(&self) -> RowChange {
        let any_modified = self.cells.iter().any(EditCell::modified);
        match (any_modified, self.is_synthetic()) {
            (true, true) => RowChange::New,
            (true, false) => RowChange::Modified,
            (false, _) => RowChange::Unchanged,
        }
    }

    /// No cell carries an original value, so the row never existed
    pub fn is_synthetic(&self) -> bool {
        self.cells.iter().all(|c| c.original().is_empty())
    }
}

/// What the operator left behind when they applied their edits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditOutcome {
    /// Rows in display order
    pub rows: Vec<EditRow>,
    /// Rows the operator removed
    pub removed: Vec<EditRow>,
}

/// Checks cell edits against the column rules
#[derive(Debug, Clone)]
pub struct CellValidator {
    rules: Vec<ColumnRule>,
}

impl CellValidator {
    pub fn new(rules: Vec<ColumnRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ColumnRule] {
        &self.rules
    }

    /// Validated text for column `col`, or the reason it was rejected
    pub fn validate(&self, col: usize, text: &str) -> gridsql_core::Result<String> {
        match self.rules.get(col) {
            Some(rule) => rule.validate(text),
            None => Err(gridsql_core::GridsqlError::NotFound(format!(
                "column {}",
                col
            ))),
        }
    }
}

/// Everything a spreadsheet needs to show and edit a result
pub struct EditRequest<'a> {
    pub title: &'a str,
    pub headers: &'a [String],
    /// Fetched rows rendered as text, NULL shown as the null sentinel
    pub rows: &'a [Vec<String>],
    pub validator: &'a CellValidator,
    pub null: &'a str,
}

/// Interactive editor for a fetched result
pub trait Spreadsheet {
    /// Let the operator edit `request`; `None` means the edits were discarded
    fn edit(&mut self, request: EditRequest<'_>) -> Result<Option<EditOutcome>>;
}
