//! One operator session against one connection

use crate::{
    AuditLog, CellValidator, ChangeApplier, ColumnRule, CrlfWriter, DmlCompiler, EditError,
    EditRequest, EditRow, KeySource, Outcome, Result, Spreadsheet,
};
use gridsql_core::text::{cut_field, first_keyword};
use gridsql_core::{Connection, DialectEntry, GridsqlError, QueryResult, Transaction, Value, with_cancel};
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Grid text standing for SQL NULL unless configured otherwise
pub const DEFAULT_NULL: &str = "\u{2400}";

/// Statements that change rows and open a transaction on their own
const DML_KEYWORDS: [&str; 6] = ["INSERT", "UPDATE", "DELETE", "MERGE", "REPLACE", "UPSERT"];

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Null sentinel shown in and read back from the grid
    pub null: String,
    /// Write spool output with CRLF line endings
    pub spool_crlf: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            null: DEFAULT_NULL.to_string(),
            spool_crlf: false,
        }
    }
}

/// Tally of one edit invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditSummary {
    pub applied: usize,
    pub cancelled: usize,
    pub failed: usize,
    /// Rows whose text could not be coerced
    pub rejected: usize,
}

impl EditSummary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Applied(_) => self.applied += 1,
            Outcome::Cancelled => self.cancelled += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Result of a statement run outside the edit flow
#[derive(Debug)]
pub enum RawOutcome {
    Rows(QueryResult),
    Affected(u64),
    /// Statements without a row count, such as DDL
    Done,
}

/// Connection, dialect and transaction state for one operator
pub struct EditSession {
    conn: Arc<dyn Connection>,
    dialect: Arc<DialectEntry>,
    settings: SessionSettings,
    tx: Option<Box<dyn Transaction>>,
    audit: AuditLog,
    cancel: CancellationToken,
}

impl EditSession {
    pub fn new(conn: Arc<dyn Connection>, dialect: Arc<DialectEntry>, settings: SessionSettings) -> Self {
        Self {
            conn,
            dialect,
            settings,
            tx: None,
            audit: AuditLog::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn dialect(&self) -> &DialectEntry {
        &self.dialect
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn has_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Token raced against every database call from now on
    pub fn set_cancel_token(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    /// Replace the spool sink; CRLF conversion follows the settings
    pub fn set_spool(&mut self, spool: Option<Box<dyn Write + Send>>) -> Result<()> {
        let spool = match spool {
            Some(sink) if self.settings.spool_crlf => {
                Some(Box::new(CrlfWriter::new(sink)) as Box<dyn Write + Send>)
            }
            other => other,
        };
        self.audit.set_spool(spool)?;
        Ok(())
    }

    pub fn spool_active(&self) -> bool {
        self.audit.is_active()
    }

    /// The session's audit log, for echoing commands and results
    pub fn audit(&mut self) -> &mut AuditLog {
        &mut self.audit
    }

    /// Run a query through the open transaction, if any
    pub async fn query(&self, sql: &str) -> Result<QueryResult> {
        let conn = self.conn.as_ref();
        let result = match self.tx.as_deref() {
            Some(tx) => with_cancel(&self.cancel, conn, tx.query(sql, &[])).await?,
            None => with_cancel(&self.cancel, conn, conn.query(sql, &[])).await?,
        };
        Ok(result)
    }

    /// Fetch `table_and_where`, let the operator edit it in `grid`, then
    /// confirm and apply the resulting statements one by one.
    ///
    /// The argument is `<table> [WHERE ...]`; the table name is its first
    /// field. Nothing is committed.
    #[tracing::instrument(skip(self, grid, keys, term))]
    pub async fn edit(
        &mut self,
        table_and_where: &str,
        grid: &mut dyn Spreadsheet,
        keys: &mut dyn KeySource,
        term: &mut dyn Write,
    ) -> Result<EditSummary> {
        let table_and_where = table_and_where.trim().trim_end_matches(';').trim_end();
        let (table, _) = cut_field(table_and_where);
        if table.is_empty() {
            return Err(GridsqlError::Configuration("EDIT: table name is not specified".into()).into());
        }

        let result = self
            .query(&format!("SELECT * FROM {}", table_and_where))
            .await?;
        let null = self.settings.null.clone();
        let rules: Vec<ColumnRule> = result
            .columns
            .iter()
            .map(|c| ColumnRule::new(c, &self.dialect, &null))
            .collect();
        let headers: Vec<String> = result.columns.iter().map(|c| c.name.clone()).collect();
        let rendered: Vec<Vec<String>> = result
            .rows
            .iter()
            .map(|row| {
                row.values
                    .iter()
                    .map(|v| match v {
                        Value::Null => null.clone(),
                        other => self.dialect.display_value(other),
                    })
                    .collect()
            })
            .collect();

        let validator = CellValidator::new(rules);
        let outcome = grid.edit(EditRequest {
            title: table_and_where,
            headers: &headers,
            rows: &rendered,
            validator: &validator,
            null: &null,
        })?;
        let Some(outcome) = outcome else {
            tracing::debug!(table = %table, "edit discarded");
            return Ok(EditSummary::default());
        };

        let compiler = DmlCompiler::new(&table, validator.rules(), &self.dialect, &null);
        let mut applier = ChangeApplier::new(
            self.conn.as_ref(),
            &mut self.tx,
            keys,
            term,
            &mut self.audit,
            &self.cancel,
        );
        let mut summary = EditSummary::default();

        let edited = outcome.rows.iter().map(|row| (row, false));
        let removed = outcome.removed.iter().map(|row| (row, true));
        for (row, is_removed) in edited.chain(removed) {
            let compiled = if is_removed {
                compiler.compile_removed(row)
            } else {
                compiler.compile_row(row)
            };
            match compiled {
                Ok(Some(stmt)) => summary.record(&applier.submit(&stmt).await?),
                Ok(None) => {}
                Err(err) => {
                    applier.reject(&err)?;
                    summary.rejected += 1;
                }
            }
        }
        tracing::info!(
            table = %table,
            applied = summary.applied,
            cancelled = summary.cancelled,
            failed = summary.failed,
            rejected = summary.rejected,
            "edit finished"
        );
        Ok(summary)
    }

    /// Run a statement typed by the operator.
    ///
    /// Row-changing statements open a transaction when none is open and roll
    /// it back again when they fail or touch nothing. Anything else may only
    /// join an open transaction when the dialect allows it.
    #[tracing::instrument(skip(self, term))]
    pub async fn execute_raw(&mut self, sql: &str, term: &mut dyn Write) -> Result<RawOutcome> {
        let sql = sql.trim().trim_end_matches(';').trim_end();
        let keyword = first_keyword(sql);

        if keyword == "SELECT" || self.dialect.is_query(sql) {
            return Ok(RawOutcome::Rows(self.query(sql).await?));
        }

        if DML_KEYWORDS.contains(&keyword.as_str()) {
            return self.execute_dml(sql, term).await;
        }

        match self.tx.as_deref() {
            Some(tx) if self.dialect.is_transaction_safe(sql) => {
                with_cancel(&self.cancel, self.conn.as_ref(), tx.execute(sql, &[])).await?;
            }
            Some(_) => return Err(EditError::TransactionOpen),
            None => {
                let conn = self.conn.as_ref();
                with_cancel(&self.cancel, conn, conn.execute(sql, &[])).await?;
            }
        }
        writeln!(term, "Ok")?;
        Ok(RawOutcome::Done)
    }

    async fn execute_dml(&mut self, sql: &str, term: &mut dyn Write) -> Result<RawOutcome> {
        let opened = self.tx.is_none();
        if opened {
            writeln!(term, "Starts a transaction")?;
            let conn = self.conn.as_ref();
            let tx = with_cancel(&self.cancel, conn, conn.begin_transaction()).await?;
            self.tx = Some(tx);
        }

        let result = match self.tx.as_deref() {
            Some(tx) => with_cancel(&self.cancel, self.conn.as_ref(), tx.execute(sql, &[])).await,
            None => Err(GridsqlError::Query("no open transaction".into())),
        };
        let outcome = match result {
            Ok(done) => {
                writeln!(term, "{} record(s) updated.", done.affected_rows)?;
                Ok(done.affected_rows)
            }
            Err(err) => Err(err),
        };

        if opened && !matches!(outcome, Ok(n) if n > 0) {
            if let Some(tx) = self.tx.take() {
                tracing::debug!("rolling back transaction opened by statement");
                with_cancel(&self.cancel, self.conn.as_ref(), tx.rollback()).await?;
            }
        }
        Ok(RawOutcome::Affected(outcome?))
    }

    /// Commit the open transaction, if any
    pub async fn commit(&mut self, term: &mut dyn Write) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            with_cancel(&self.cancel, self.conn.as_ref(), tx.commit()).await?;
        }
        writeln!(term, "Commit complete.")?;
        Ok(())
    }

    /// Roll back the open transaction, if any
    pub async fn rollback(&mut self, term: &mut dyn Write) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            with_cancel(&self.cancel, self.conn.as_ref(), tx.rollback()).await?;
        }
        writeln!(term, "Rollback complete.")?;
        Ok(())
    }

    pub async fn tables(&self) -> Result<Vec<String>> {
        Ok(self.dialect.tables(self.conn.as_ref()).await?)
    }

    pub async fn columns(&self, table: &str) -> Result<Vec<String>> {
        Ok(self.dialect.columns(self.conn.as_ref(), table).await?)
    }

    /// Full introspection result: all tables, or the columns of `table`
    pub async fn describe(&self, table: Option<&str>) -> Result<QueryResult> {
        let (sql, params) = match table.map(str::trim).filter(|t| !t.is_empty()) {
            Some(table) => self.dialect.column_query_for(table),
            None => (self.dialect.table_query.to_string(), Vec::new()),
        };
        let conn = self.conn.as_ref();
        let result = with_cancel(&self.cancel, conn, conn.query(&sql, &params)).await?;
        Ok(result)
    }

    /// Roll back anything still open and close the connection
    pub async fn close(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tracing::warn!("rolling back open transaction on close");
            tx.rollback().await?;
        }
        self.audit.set_spool(None)?;
        self.conn.close().await?;
        Ok(())
    }
}
