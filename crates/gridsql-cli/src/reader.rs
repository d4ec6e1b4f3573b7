//! Splits operator input into statements.
//!
//! A statement ends at a `;` outside quotes. Commands that take the rest of
//! their line, such as `EDIT` or `SPOOL`, also end at the end of the line.

use gridsql_core::text::cut_field;
use gridsql_edit::{EditError, KeySource, Result};
use std::io::Write;

const ONE_LINE_COMMANDS: [&str; 8] = ["DESC", "\\D", "EDIT", "EXIT", "QUIT", "REM", "SPOOL", "START"];

fn is_one_line_command(line: &str) -> bool {
    let (first, _) = cut_field(line);
    let first = first.trim_end_matches(';').to_uppercase();
    ONE_LINE_COMMANDS.contains(&first.as_str())
}

#[derive(Debug, Default)]
pub struct StatementReader {
    /// Text after a terminator that belongs to the next statement
    carry: String,
}

impl StatementReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next statement without its terminator, or `None` at end of input.
    ///
    /// Unterminated text at end of input is returned as a final statement.
    /// `prompt` receives `SQL> ` style prompts; `in_tx` switches them to the
    /// `SQL* ` form.
    pub fn read(
        &mut self,
        source: &mut dyn KeySource,
        mut prompt: Option<&mut dyn Write>,
        in_tx: bool,
    ) -> Result<Option<String>> {
        let mut buffer = String::new();
        let mut quote: Option<char> = None;
        let mut line_no = 0;

        loop {
            let line = if self.carry.is_empty() {
                if let Some(out) = prompt.as_deref_mut() {
                    write_prompt(out, line_no, in_tx)?;
                }
                match source.read_line() {
                    Ok(line) => line,
                    Err(EditError::KeySource(_)) => {
                        let rest = buffer.trim();
                        return Ok((!rest.is_empty()).then(|| rest.to_string()));
                    }
                    Err(err) => return Err(err),
                }
            } else {
                std::mem::take(&mut self.carry)
            };
            line_no += 1;

            if buffer.trim().is_empty() && is_one_line_command(&line) {
                let line = line.trim().trim_end_matches(';').trim_end();
                return Ok(Some(line.to_string()));
            }

            for (i, c) in line.char_indices() {
                match (quote, c) {
                    (None, '\'' | '"') => quote = Some(c),
                    (Some(q), _) if q == c => quote = None,
                    (None, ';') => {
                        let rest = line[i + 1..].trim();
                        if !rest.is_empty() {
                            self.carry = rest.to_string();
                        }
                        let statement = buffer.trim();
                        if statement.is_empty() {
                            // a lone terminator
                            break;
                        }
                        return Ok(Some(statement.to_string()));
                    }
                    _ => {}
                }
                buffer.push(c);
            }
            if quote.is_some() || !buffer.trim().is_empty() {
                buffer.push('\n');
            }
        }
    }
}

fn write_prompt(out: &mut dyn Write, line_no: usize, in_tx: bool) -> Result<()> {
    let mark = if in_tx { '*' } else { '>' };
    if line_no == 0 {
        write!(out, "SQL{} ", mark)?;
    } else {
        write!(out, "{:3}{} ", line_no + 1, mark)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsql_edit::LineKeys;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn statements(input: &str) -> Vec<String> {
        let mut source = LineKeys::new(Cursor::new(input.to_string()));
        let mut reader = StatementReader::new();
        let mut out = Vec::new();
        while let Some(stmt) = reader.read(&mut source, None, false).unwrap() {
            out.push(stmt);
        }
        out
    }

    #[test]
    fn test_multi_line_statement() {
        assert_eq!(
            statements("SELECT *\n  FROM t\n WHERE a = 1;\n"),
            vec!["SELECT *\n  FROM t\n WHERE a = 1"]
        );
    }

    #[test]
    fn test_semicolon_inside_quotes() {
        assert_eq!(
            statements("INSERT INTO t VALUES ('a;b', \"c;\nd\");\nCOMMIT;"),
            vec!["INSERT INTO t VALUES ('a;b', \"c;\nd\")", "COMMIT"]
        );
    }

    #[test]
    fn test_several_statements_on_one_line() {
        assert_eq!(
            statements("DELETE FROM t; COMMIT;;\n"),
            vec!["DELETE FROM t", "COMMIT"]
        );
    }

    #[test]
    fn test_one_line_commands_need_no_terminator() {
        assert_eq!(
            statements("edit t where a = 1\nSPOOL out.log\nrem note\nselect 1\n;\nexit"),
            vec!["edit t where a = 1", "SPOOL out.log", "rem note", "select 1", "exit"]
        );
    }

    #[test]
    fn test_unterminated_tail_is_returned() {
        assert_eq!(statements("COMMIT;\nSELECT 2\n\n"), vec!["COMMIT", "SELECT 2"]);
        assert!(statements("\n  \n").is_empty());
    }

    #[test]
    fn test_prompts() {
        let mut source = LineKeys::new(Cursor::new("SELECT\n1;\n".to_string()));
        let mut reader = StatementReader::new();
        let mut out = Vec::new();
        let stmt = reader.read(&mut source, Some(&mut out), true).unwrap();
        assert_eq!(stmt.as_deref(), Some("SELECT\n1"));
        assert_eq!(String::from_utf8(out).unwrap(), "SQL*   2* ");
    }
}
