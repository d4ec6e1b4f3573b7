//! Confirm/execute state machine.
//!
//! Each compiled statement is shown to the operator, who decides whether it
//! runs. The first statement that runs opens a transaction lazily; nothing is
//! committed here.
//!
//! | State        | On submit                                         |
//! |--------------|---------------------------------------------------|
//! | `Normal`     | show SQL, ask `y`/`n`/`a`/`N`                     |
//! | `ApplyAll`   | run without asking                                |
//! | `DiscardAll` | skip without touching the database                |
//! | `Failing`    | ask whether to continue (`c`) or abort (`a`) first |

use crate::audit::CANCEL_PREFIX;
use crate::{AuditLog, CompiledStatement, EditError, Result};
use gridsql_core::{Connection, GridsqlError, Transaction, with_cancel};
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use tokio_util::sync::CancellationToken;

const APPLY_PROMPT: &str = "Apply this change? (y/n/a:all/N:none) ";
const CONTINUE_PROMPT: &str = "Continue or abort [c/a] ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Normal,
    Failing,
    DiscardAll,
    ApplyAll,
}

/// What happened to one submitted statement
#[derive(Debug)]
pub enum Outcome {
    Applied(u64),
    Cancelled,
    Failed(GridsqlError),
}

/// Source of operator key presses
pub trait KeySource {
    /// Next key press
    fn get_key(&mut self) -> Result<String>;

    /// Next full input line, without its terminator
    fn read_line(&mut self) -> Result<String>;
}

/// Keys read from a line-oriented reader such as stdin.
///
/// A key is the first character of the next non-empty line.
pub struct LineKeys<R: BufRead> {
    reader: R,
}

impl<R: BufRead> LineKeys<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> KeySource for LineKeys<R> {
    fn get_key(&mut self) -> Result<String> {
        loop {
            let line = self.read_line()?;
            if let Some(c) = line.trim().chars().next() {
                return Ok(c.to_string());
            }
        }
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(EditError::KeySource("end of input".into()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Keys replayed from a script where `|` stands for Enter
#[derive(Debug, Clone)]
pub struct ScriptedKeys {
    keys: VecDeque<char>,
}

impl ScriptedKeys {
    pub fn new(script: &str) -> Self {
        Self {
            keys: script
                .chars()
                .map(|c| if c == '|' { '\n' } else { c })
                .collect(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeySource for ScriptedKeys {
    fn get_key(&mut self) -> Result<String> {
        self.keys
            .pop_front()
            .map(String::from)
            .ok_or_else(|| EditError::KeySource("scripted keys exhausted".into()))
    }

    fn read_line(&mut self) -> Result<String> {
        if self.keys.is_empty() {
            return Err(EditError::KeySource("scripted keys exhausted".into()));
        }
        let mut line = String::new();
        while let Some(c) = self.keys.pop_front() {
            if c == '\n' {
                break;
            }
            line.push(c);
        }
        Ok(line)
    }
}

enum Decision {
    Apply,
    Skip,
    ApplyAll,
    DiscardAll,
}

/// Runs compiled statements one by one under operator control.
///
/// Borrows the session's transaction slot for the length of one diff.
pub struct ChangeApplier<'a> {
    conn: &'a dyn Connection,
    tx: &'a mut Option<Box<dyn Transaction>>,
    keys: &'a mut dyn KeySource,
    term: &'a mut dyn Write,
    audit: &'a mut AuditLog,
    cancel: &'a CancellationToken,
    state: ExecutionState,
}

impl<'a> ChangeApplier<'a> {
    pub fn new(
        conn: &'a dyn Connection,
        tx: &'a mut Option<Box<dyn Transaction>>,
        keys: &'a mut dyn KeySource,
        term: &'a mut dyn Write,
        audit: &'a mut AuditLog,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            conn,
            tx,
            keys,
            term,
            audit,
            cancel,
            state: ExecutionState::Normal,
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Ask about, run or skip `stmt` according to the current state.
    ///
    /// Only cancellation and terminal I/O failures are returned as errors;
    /// a failing statement is reported as [`Outcome::Failed`].
    pub async fn submit(&mut self, stmt: &CompiledStatement) -> Result<Outcome> {
        let mut shown = false;
        loop {
            match self.state {
                ExecutionState::Failing => {
                    self.state = if self.ask_continue()? {
                        ExecutionState::Normal
                    } else {
                        ExecutionState::DiscardAll
                    };
                }
                ExecutionState::DiscardAll => return self.skip(stmt, shown),
                ExecutionState::ApplyAll => {
                    if !shown {
                        self.show(stmt)?;
                    }
                    return self.execute(stmt).await;
                }
                ExecutionState::Normal => {
                    self.show(stmt)?;
                    shown = true;
                    match self.ask_apply()? {
                        Decision::Apply => return self.execute(stmt).await,
                        Decision::Skip => return self.skip(stmt, shown),
                        Decision::ApplyAll => self.state = ExecutionState::ApplyAll,
                        Decision::DiscardAll => self.state = ExecutionState::DiscardAll,
                    }
                }
            }
        }
    }

    /// Report a row that could not be compiled
    pub fn reject(&mut self, error: &GridsqlError) -> Result<()> {
        writeln!(self.term, "{}", error)?;
        self.audit.log_error(error)?;
        Ok(())
    }

    fn show(&mut self, stmt: &CompiledStatement) -> Result<()> {
        writeln!(self.term, "---\n{}", stmt.sql)?;
        Ok(())
    }

    fn ask_apply(&mut self) -> Result<Decision> {
        loop {
            write!(self.term, "{}", APPLY_PROMPT)?;
            self.term.flush()?;
            let key = match self.keys.get_key() {
                Ok(key) => key,
                Err(err) => {
                    tracing::debug!(%err, "key source failed, discarding remaining changes");
                    writeln!(self.term)?;
                    return Ok(Decision::DiscardAll);
                }
            };
            let decision = match key.as_str() {
                "y" | "Y" => Decision::Apply,
                "n" => Decision::Skip,
                "N" => Decision::DiscardAll,
                "a" | "A" => Decision::ApplyAll,
                _ => continue,
            };
            writeln!(self.term, "{}", key)?;
            return Ok(decision);
        }
    }

    fn ask_continue(&mut self) -> Result<bool> {
        loop {
            write!(self.term, "{}", CONTINUE_PROMPT)?;
            self.term.flush()?;
            let Ok(key) = self.keys.get_key() else {
                writeln!(self.term)?;
                return Ok(false);
            };
            match key.as_str() {
                "c" | "C" => {
                    writeln!(self.term, "{}", key)?;
                    return Ok(true);
                }
                "a" | "A" => {
                    writeln!(self.term, "{}", key)?;
                    return Ok(false);
                }
                _ => continue,
            }
        }
    }

    /// Statements the operator never saw are listed as cancelled
    fn skip(&mut self, stmt: &CompiledStatement, shown: bool) -> Result<Outcome> {
        if !shown {
            for line in stmt.sql.lines() {
                writeln!(self.term, "{}{}", CANCEL_PREFIX, line)?;
            }
        }
        self.audit.log_cancelled(&stmt.sql, &stmt.params)?;
        Ok(Outcome::Cancelled)
    }

    async fn execute(&mut self, stmt: &CompiledStatement) -> Result<Outcome> {
        let opened = self.tx.is_none();
        if opened {
            writeln!(self.term, "Starts a transaction")?;
            match with_cancel(self.cancel, self.conn, self.conn.begin_transaction()).await {
                Ok(tx) => *self.tx = Some(tx),
                Err(err) if err.is_cancelled() => return Err(err.into()),
                Err(err) => return self.fail(stmt, err),
            }
        }

        self.audit.log_statement(&stmt.sql, &stmt.params)?;
        let result = match self.tx.as_deref() {
            Some(tx) => {
                with_cancel(self.cancel, self.conn, tx.execute(&stmt.sql, &stmt.params)).await
            }
            None => Err(GridsqlError::Query("no open transaction".into())),
        };

        let err = match result {
            Ok(done) if done.affected_rows > 0 => {
                writeln!(self.term, "{} record(s) updated.", done.affected_rows)?;
                tracing::debug!(affected_rows = done.affected_rows, "change applied");
                return Ok(Outcome::Applied(done.affected_rows));
            }
            Ok(_) => GridsqlError::NoRowsAffected,
            Err(err) if err.is_cancelled() => return Err(err.into()),
            Err(err) => err,
        };

        if opened && let Some(tx) = self.tx.take() {
            tracing::warn!(error = %err, "rolling back transaction opened by failed change");
            if let Err(rollback_err) = with_cancel(self.cancel, self.conn, tx.rollback()).await {
                if rollback_err.is_cancelled() {
                    return Err(rollback_err.into());
                }
                tracing::error!(error = %rollback_err, "rollback failed");
            }
        }
        self.fail(stmt, err)
    }

    fn fail(&mut self, stmt: &CompiledStatement, err: GridsqlError) -> Result<Outcome> {
        writeln!(self.term, "{}\n{}", err, stmt.sql)?;
        self.audit.log_error(&err)?;
        self.state = ExecutionState::Failing;
        Ok(Outcome::Failed(err))
    }
}
