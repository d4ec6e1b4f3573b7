//! Line-driven grid editor.
//!
//! ```text
//! set <row> <col> <text>   replace a cell
//! null <row> <col>         set a cell to NULL
//! add <v1>,<v2>,...        append a row
//! del <row>                remove a row
//! show                     print the grid
//! c                        apply the edits
//! q                        discard the edits
//! ```
//!
//! Rows and columns are 1-based; a column may also be given by name.

use crate::keys::SharedKeys;
use crate::render::render_grid;
use gridsql_core::text::cut_field;
use gridsql_edit::{
    CellValidator, EditCell, EditError, EditOutcome, EditRequest, EditRow, KeySource, Result,
    Spreadsheet,
};
use std::io::Write;

const HELP: &str = "set <row> <col> <text> | null <row> <col> | add <v1>,<v2>,... | del <row> | show | c(apply) | q(discard)";

/// [`Spreadsheet`] that reads editing commands from the shared key source
pub struct PromptGrid {
    keys: SharedKeys,
    term: Box<dyn Write + Send>,
    echo: bool,
}

impl PromptGrid {
    pub fn new(keys: SharedKeys, term: Box<dyn Write + Send>) -> Self {
        Self {
            keys,
            term,
            echo: true,
        }
    }

    /// Whether command lines are echoed back; off when a terminal already shows them
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

/// Grid contents while the operator is editing
struct Sheet<'a> {
    headers: &'a [String],
    validator: &'a CellValidator,
    null: &'a str,
    rows: Vec<EditRow>,
    removed: Vec<EditRow>,
}

enum Step {
    Edit,
    Show,
    Apply,
    Discard,
}

impl Sheet<'_> {
    fn row_index(&self, arg: &str) -> std::result::Result<usize, String> {
        match arg.parse::<usize>() {
            Ok(n) if (1..=self.rows.len()).contains(&n) => Ok(n - 1),
            _ => Err(format!("{}: no such row", arg)),
        }
    }

    fn col_index(&self, arg: &str) -> std::result::Result<usize, String> {
        if let Ok(n) = arg.parse::<usize>()
            && (1..=self.headers.len()).contains(&n)
        {
            return Ok(n - 1);
        }
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(arg))
            .ok_or_else(|| format!("{}: no such column", arg))
    }

    fn set(&mut self, row: &str, col: &str, text: &str) -> std::result::Result<(), String> {
        let row = self.row_index(row)?;
        let col = self.col_index(col)?;
        let text = self
            .validator
            .validate(col, text)
            .map_err(|err| err.to_string())?;
        if let Some(cell) = self.rows[row].cells.get_mut(col) {
            cell.set_text(text);
        }
        Ok(())
    }

    fn add(&mut self, values: &str) -> std::result::Result<(), String> {
        let mut texts: Vec<&str> = values.split(',').map(str::trim).collect();
        if texts.len() > self.headers.len() {
            return Err(format!("expected at most {} values", self.headers.len()));
        }
        texts.resize(self.headers.len(), self.null);
        let cells = texts
            .iter()
            .enumerate()
            .map(|(col, text)| {
                self.validator
                    .validate(col, text)
                    .map(EditCell::added)
                    .map_err(|err| err.to_string())
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.rows.push(EditRow::new(cells));
        Ok(())
    }

    fn delete(&mut self, row: &str) -> std::result::Result<(), String> {
        let row = self.row_index(row)?;
        let removed = self.rows.remove(row);
        self.removed.push(removed);
        Ok(())
    }

    fn render(&self) -> String {
        let rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| r.cells.iter().map(|c| c.text().to_string()).collect())
            .collect();
        render_grid(self.headers, rows.iter().map(Vec::as_slice))
    }

    fn apply(&mut self, line: &str) -> std::result::Result<Step, String> {
        let (command, rest) = cut_field(line);
        match command.to_lowercase().as_str() {
            "" => {}
            "set" => {
                let (row, rest) = cut_field(rest);
                let (col, text) = cut_field(rest);
                self.set(&row, &col, text.trim())?;
            }
            "null" => {
                let (row, rest) = cut_field(rest);
                let (col, _) = cut_field(rest);
                let null = self.null;
                self.set(&row, &col, null)?;
            }
            "add" => self.add(rest)?,
            "del" => {
                let (row, _) = cut_field(rest);
                self.delete(&row)?;
            }
            "show" => return Ok(Step::Show),
            "c" => return Ok(Step::Apply),
            "q" => return Ok(Step::Discard),
            other => return Err(format!("{}: unknown command ({})", other, HELP)),
        }
        Ok(Step::Edit)
    }
}

impl Spreadsheet for PromptGrid {
    fn edit(&mut self, request: EditRequest<'_>) -> Result<Option<EditOutcome>> {
        let mut sheet = Sheet {
            headers: request.headers,
            validator: request.validator,
            null: request.null,
            rows: request.rows.iter().map(|r| EditRow::fetched(r.as_slice())).collect(),
            removed: Vec::new(),
        };
        writeln!(self.term, "{}\n{}{}", request.title, sheet.render(), HELP)?;

        loop {
            write!(self.term, "edit> ")?;
            self.term.flush()?;
            let line = match self.keys.read_line() {
                Ok(line) => line,
                Err(EditError::KeySource(reason)) => {
                    writeln!(self.term)?;
                    tracing::debug!(%reason, "grid input ended, discarding edits");
                    return Ok(None);
                }
                Err(err) => return Err(err),
            };
            if self.echo {
                writeln!(self.term, "{}", line)?;
            }
            match sheet.apply(line.trim()) {
                Ok(Step::Edit) => {}
                Ok(Step::Show) => write!(self.term, "{}", sheet.render())?,
                Ok(Step::Apply) => {
                    return Ok(Some(EditOutcome {
                        rows: sheet.rows,
                        removed: sheet.removed,
                    }));
                }
                Ok(Step::Discard) => return Ok(None),
                Err(message) => writeln!(self.term, "{}", message)?,
            }
        }
    }
}
