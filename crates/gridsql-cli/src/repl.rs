//! Command loop

use crate::grid::PromptGrid;
use crate::keys::SharedKeys;
use crate::reader::StatementReader;
use crate::render::{render_history, render_result};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use gridsql_core::text::cut_field;
use gridsql_edit::{EditSession, KeySource, LineKeys, RawOutcome, open_spool};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

const COMMIT_PROMPT: &str = "Commit the open transaction? (y/n) ";

/// Whether the loop keeps reading after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Where statements come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// A script file; the first error stops it and nothing enters the history
    Script,
    /// Standard input that is not a terminal; the first error stops it
    Piped,
    /// The operator's terminal, with prompts
    Terminal,
}

impl Input {
    fn aborts_on_error(self) -> bool {
        self != Input::Terminal
    }
}

pub struct Repl {
    session: EditSession,
    keys: SharedKeys,
    grid: PromptGrid,
    out: Box<dyn Write + Send>,
    spool_name: Option<PathBuf>,
    auto_commit_prompt: bool,
    history: Vec<(DateTime<Local>, String)>,
}

impl Repl {
    pub fn new(
        session: EditSession,
        keys: SharedKeys,
        grid: PromptGrid,
        out: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            session,
            keys,
            grid,
            out,
            spool_name: None,
            auto_commit_prompt: false,
            history: Vec::new(),
        }
    }

    /// Ask whether to commit a transaction left open on exit
    pub fn with_auto_commit_prompt(mut self, enabled: bool) -> Self {
        self.auto_commit_prompt = enabled;
        self
    }

    /// Read and run statements from `source` until it ends or `EXIT`.
    ///
    /// Outside the terminal the first failing statement stops the loop and
    /// its error is returned; otherwise it is printed and the loop goes on.
    pub async fn run(&mut self, source: &mut dyn KeySource, input: Input) -> Result<Flow> {
        let mut reader = StatementReader::new();
        loop {
            let in_tx = self.session.has_transaction();
            let out: Option<&mut dyn Write> = if input == Input::Terminal {
                Some(&mut *self.out)
            } else {
                None
            };
            let Some(statement) = reader.read(source, out, in_tx)? else {
                return Ok(Flow::Continue);
            };
            if input != Input::Script {
                self.history.push((Local::now(), statement.clone()));
            }

            match self.dispatch(&statement).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => return Ok(Flow::Exit),
                Err(err) => {
                    self.emit(&format!("{:#}\n", err))?;
                    if input.aborts_on_error() {
                        return Err(err);
                    }
                }
            }
        }
    }

    /// Run one statement with a fresh cancellation token tied to Ctrl-C
    pub async fn dispatch(&mut self, statement: &str) -> Result<Flow> {
        let token = CancellationToken::new();
        self.session.set_cancel_token(token.clone());
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("interrupt, cancelling statement");
                token.cancel();
            }
        });
        let flow = self.command(statement).await;
        watcher.abort();
        flow
    }

    async fn command(&mut self, statement: &str) -> Result<Flow> {
        let (command, arg) = cut_field(statement);
        match command.to_uppercase().as_str() {
            "" | "REM" => {}
            "EXIT" | "QUIT" => return Ok(Flow::Exit),
            "SPOOL" => self.spool(arg)?,
            "START" => {
                let (file, _) = cut_field(arg);
                self.start(&file).await?;
            }
            "EDIT" => {
                self.echo(statement)?;
                self.session
                    .edit(arg, &mut self.grid, &mut self.keys, &mut self.out)
                    .await?;
            }
            "COMMIT" => {
                self.echo(statement)?;
                let mut term = Vec::new();
                let result = self.session.commit(&mut term).await;
                self.emit_bytes(&term)?;
                result?;
            }
            "ROLLBACK" => {
                self.echo(statement)?;
                let mut term = Vec::new();
                let result = self.session.rollback(&mut term).await;
                self.emit_bytes(&term)?;
                result?;
            }
            "DESC" | "\\D" => {
                self.echo(statement)?;
                self.describe(arg.trim()).await?;
            }
            "HISTORY" => {
                self.echo(statement)?;
                let text = render_history(&self.history);
                self.emit(&text)?;
            }
            _ => {
                self.echo(statement)?;
                let mut term = Vec::new();
                let outcome = self.session.execute_raw(statement, &mut term).await;
                self.emit_bytes(&term)?;
                if let RawOutcome::Rows(result) = outcome? {
                    let text = render_result(
                        &result,
                        self.session.dialect(),
                        &self.session.settings().null,
                    );
                    self.emit(&text)?;
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// `SPOOL` reports, `SPOOL OFF` closes and `SPOOL <file>` starts spooling
    pub fn spool(&mut self, arg: &str) -> Result<()> {
        let (name, _) = cut_field(arg);
        if name.is_empty() {
            match &self.spool_name {
                Some(path) => writeln!(self.out, "Spooling to '{}' now", path.display())?,
                None => writeln!(self.out, "Not Spooling")?,
            }
            return Ok(());
        }
        if self.session.spool_active() {
            self.session.set_spool(None)?;
            self.spool_name = None;
            writeln!(self.out, "Spool closed.")?;
        }
        if !name.eq_ignore_ascii_case("off") {
            let path = PathBuf::from(&name);
            let sink = open_spool(&path).with_context(|| format!("SPOOL: cannot open {}", name))?;
            self.session.set_spool(Some(sink))?;
            writeln!(self.out, "Spool to {}", name)?;
            self.spool_name = Some(path);
        }
        Ok(())
    }

    async fn start(&mut self, file: &str) -> Result<()> {
        if file.is_empty() {
            bail!("START: file name is not specified");
        }
        let reader = File::open(file).with_context(|| format!("START: cannot open {}", file))?;
        let mut source = LineKeys::new(BufReader::new(reader));
        tracing::debug!(file, "running script");
        Box::pin(self.run(&mut source, Input::Script))
            .await
            .with_context(|| format!("{}: script stopped", file))?;
        Ok(())
    }

    async fn describe(&mut self, table: &str) -> Result<()> {
        let result = self.session.describe(Some(table)).await?;
        if result.row_count() == 0 {
            if table.is_empty() {
                bail!("no tables are found");
            }
            bail!("{}: table not found", table);
        }
        let text = render_result(&result, self.session.dialect(), &self.session.settings().null);
        self.emit(&text)
    }

    /// Settle an open transaction and close the session
    pub async fn finish(&mut self) -> Result<()> {
        self.session.set_cancel_token(CancellationToken::new());
        if self.session.has_transaction() {
            let commit = self.auto_commit_prompt && self.confirm_commit()?;
            let mut term = Vec::new();
            let result = if commit {
                self.session.commit(&mut term).await
            } else {
                self.session.rollback(&mut term).await
            };
            self.emit_bytes(&term)?;
            result?;
        }
        self.session.close().await?;
        Ok(())
    }

    fn confirm_commit(&mut self) -> Result<bool> {
        write!(self.out, "{}", COMMIT_PROMPT)?;
        self.out.flush()?;
        match self.keys.get_key() {
            Ok(key) => {
                writeln!(self.out, "{}", key)?;
                Ok(key == "y" || key == "Y")
            }
            Err(_) => {
                writeln!(self.out)?;
                Ok(false)
            }
        }
    }

    fn echo(&mut self, statement: &str) -> Result<()> {
        self.session.audit().log_statement(statement, &[])?;
        Ok(())
    }

    /// Write to the terminal and the spool
    fn emit(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        self.session.audit().echo(text)?;
        Ok(())
    }

    fn emit_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.emit(&String::from_utf8_lossy(bytes))
    }
}
