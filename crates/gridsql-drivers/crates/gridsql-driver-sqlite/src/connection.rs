//! SQLite connection implementation

use async_trait::async_trait;
use gridsql_core::{
    BoundParam, ColumnMeta, Connection, GridsqlError, QueryCancelHandle, QueryResult, Result, Row,
    StatementResult, Transaction, Value,
};
use parking_lot::Mutex;
use rusqlite::{
    Connection as RusqliteConnection, ErrorCode, InterruptHandle, OpenFlags, params_from_iter,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Layout SQLite's date functions accept for offset-carrying instants
const SQLITE_DATETIME_TZ_LAYOUT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

/// Interrupts the statement running on a [`SqliteConnection`]; the
/// interrupted call fails with `SQLITE_INTERRUPT`
pub struct SqliteCancelHandle {
    interrupt_handle: Arc<InterruptHandle>,
}

impl QueryCancelHandle for SqliteCancelHandle {
    fn cancel(&self) {
        tracing::debug!("interrupting SQLite statement");
        self.interrupt_handle.interrupt();
    }
}

/// SQLite connection wrapper.
///
/// Statements run on tokio's blocking pool so a cancelled caller is not
/// stuck behind them.
pub struct SqliteConnection {
    conn: Arc<Mutex<RusqliteConnection>>,
    interrupt_handle: Arc<InterruptHandle>,
    closed: AtomicBool,
}

impl SqliteConnection {
    /// Open a SQLite database from a DSN such as `:memory:`, a file path,
    /// `sqlite3:<path>` or a `file:` URI
    pub fn open(dsn: &str) -> Result<Self> {
        tracing::info!(dsn = %dsn, "opening SQLite database");
        let path = strip_scheme(dsn);
        let expanded_path = Self::expand_path(path)?;

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                GridsqlError::Connection(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            if !expanded_path.starts_with("file:") {
                let file_path = std::path::Path::new(&expanded_path);
                if let Some(parent) = file_path.parent()
                    && !parent.exists()
                {
                    return Err(GridsqlError::Connection(format!(
                        "Parent directory does not exist: {}",
                        parent.display()
                    )));
                }
            }

            RusqliteConnection::open_with_flags(&expanded_path, flags).map_err(|e| {
                GridsqlError::Connection(format!(
                    "Failed to open SQLite database at '{}': {}",
                    expanded_path, e
                ))
            })?
        };

        conn.pragma_update(None, "foreign_keys", "ON").map_err(|e| {
            GridsqlError::Connection(format!("Failed to enable foreign keys: {}", e))
        })?;

        let interrupt_handle = Arc::new(conn.get_interrupt_handle());

        tracing::info!(path = %expanded_path, "SQLite database connection established");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt_handle,
            closed: AtomicBool::new(false),
        })
    }

    /// Expand `~/` and make relative paths absolute
    fn expand_path(path: &str) -> Result<String> {
        if path == ":memory:" || path.starts_with("file:") {
            return Ok(path.to_string());
        }

        let expanded = if let Some(rest) = path.strip_prefix("~/") {
            let home = dirs::home_dir().ok_or_else(|| {
                GridsqlError::Configuration("Unable to determine HOME directory".into())
            })?;
            home.join(rest).to_string_lossy().to_string()
        } else if path.starts_with('~') {
            return Err(GridsqlError::Configuration(
                "User-specific home directories (~user) are not supported".into(),
            ));
        } else {
            path.to_string()
        };

        let path_buf = std::path::PathBuf::from(&expanded);
        if path_buf.is_relative() {
            Ok(std::env::current_dir()?
                .join(path_buf)
                .to_string_lossy()
                .to_string())
        } else {
            Ok(expanded)
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(GridsqlError::Connection("connection is closed".into()));
        }
        Ok(())
    }
}

/// Run `f` with the locked connection on the blocking pool
async fn blocking<T, F>(conn: &Arc<Mutex<RusqliteConnection>>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&RusqliteConnection) -> Result<T> + Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || f(&conn.lock()))
        .await
        .map_err(|e| GridsqlError::Driver(format!("SQLite worker failed: {}", e)))?
}

/// `SQLITE_INTERRUPT` means the call was cancelled
fn sqlite_error(e: rusqlite::Error) -> GridsqlError {
    match e.sqlite_error_code() {
        Some(ErrorCode::OperationInterrupted) => GridsqlError::Cancelled,
        _ => GridsqlError::Query(e.to_string()),
    }
}

/// Drop a `sqlite3:`/`sqlite:` scheme and the `//` that may follow it
fn strip_scheme(dsn: &str) -> &str {
    let dsn = dsn.trim();
    for scheme in ["sqlite3:", "sqlite:"] {
        if dsn.len() >= scheme.len() && dsn[..scheme.len()].eq_ignore_ascii_case(scheme) {
            let rest = &dsn[scheme.len()..];
            return rest.strip_prefix("//").unwrap_or(rest);
        }
    }
    dsn
}

#[async_trait]
impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[BoundParam]) -> Result<StatementResult> {
        self.ensure_open()?;
        let (sql, params) = (sql.to_string(), params.to_vec());
        blocking(&self.conn, move |conn| run_execute(conn, &sql, &params)).await
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[BoundParam]) -> Result<QueryResult> {
        self.ensure_open()?;
        let (sql, params) = (sql.to_string(), params.to_vec());
        blocking(&self.conn, move |conn| run_query(conn, &sql, &params)).await
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        self.ensure_open()?;
        tracing::debug!("beginning SQLite transaction");
        blocking(&self.conn, |conn| {
            conn.execute_batch("BEGIN DEFERRED")
                .map_err(|e| GridsqlError::Query(format!("Failed to begin transaction: {}", e)))
        })
        .await?;
        Ok(Box::new(SqliteTransaction {
            conn: Arc::clone(&self.conn),
            finished: false,
        }))
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("closing SQLite connection");
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        Some(Arc::new(SqliteCancelHandle {
            interrupt_handle: Arc::clone(&self.interrupt_handle),
        }))
    }
}

/// SQLite transaction wrapper.
///
/// Issues raw `BEGIN DEFERRED` / `COMMIT` / `ROLLBACK` so it can share the
/// connection mutex with the owning [`SqliteConnection`].
pub struct SqliteTransaction {
    conn: Arc<Mutex<RusqliteConnection>>,
    finished: bool,
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                "SQLite transaction dropped without commit or rollback, issuing automatic rollback"
            );
            let conn = self.conn.lock();
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                tracing::error!(error = %e, "automatic rollback on drop failed");
            }
        }
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("committing SQLite transaction");
        self.finished = true;
        blocking(&self.conn, |conn| {
            conn.execute_batch("COMMIT")
                .map_err(|e| GridsqlError::Query(format!("Failed to commit transaction: {}", e)))
        })
        .await
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("rolling back SQLite transaction");
        self.finished = true;
        blocking(&self.conn, |conn| {
            conn.execute_batch("ROLLBACK")
                .map_err(|e| GridsqlError::Query(format!("Failed to rollback transaction: {}", e)))
        })
        .await
    }

    async fn query(&self, sql: &str, params: &[BoundParam]) -> Result<QueryResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing query in SQLite transaction");
        let (sql, params) = (sql.to_string(), params.to_vec());
        blocking(&self.conn, move |conn| run_query(conn, &sql, &params)).await
    }

    async fn execute(&self, sql: &str, params: &[BoundParam]) -> Result<StatementResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing statement in SQLite transaction");
        let (sql, params) = (sql.to_string(), params.to_vec());
        blocking(&self.conn, move |conn| run_execute(conn, &sql, &params)).await
    }
}

fn run_execute(
    conn: &RusqliteConnection,
    sql: &str,
    params: &[BoundParam],
) -> Result<StatementResult> {
    let rusqlite_params = params_to_rusqlite(params);
    let rows_affected = conn
        .execute(sql, params_from_iter(rusqlite_params.iter()))
        .map_err(sqlite_error)?;

    tracing::debug!(affected_rows = rows_affected, "statement executed");
    Ok(StatementResult {
        affected_rows: rows_affected as u64,
    })
}

fn run_query(conn: &RusqliteConnection, sql: &str, params: &[BoundParam]) -> Result<QueryResult> {
    let start_time = std::time::Instant::now();
    let rusqlite_params = params_to_rusqlite(params);

    let mut stmt = conn.prepare(sql).map_err(sqlite_error)?;

    // decl_type is the type from CREATE TABLE; expressions have none
    let columns: Vec<ColumnMeta> = stmt
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| ColumnMeta {
            name: col.name().to_string(),
            data_type: col.decl_type().unwrap_or("DYNAMIC").to_string(),
            nullable: None,
            ordinal: idx,
        })
        .collect();
    let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    let mut rows = Vec::new();
    let mut query_rows = stmt
        .query(params_from_iter(rusqlite_params.iter()))
        .map_err(sqlite_error)?;

    while let Some(row) = query_rows.next().map_err(sqlite_error)? {
        let values = (0..columns.len())
            .map(|i| rusqlite_to_value(row, i))
            .collect::<Result<Vec<_>>>()?;
        rows.push(Row::new(column_names.clone(), values));
    }

    let execution_time_ms = start_time.elapsed().as_millis() as u64;
    tracing::debug!(
        row_count = rows.len(),
        execution_time_ms = execution_time_ms,
        "query executed successfully"
    );
    Ok(QueryResult {
        id: uuid::Uuid::new_v4(),
        columns,
        rows,
        execution_time_ms,
    })
}

/// Names are ignored: `$vN` tokens appear in bind order, which is how SQLite
/// numbers them
fn params_to_rusqlite(params: &[BoundParam]) -> Vec<rusqlite::types::Value> {
    params.iter().map(|p| value_to_rusqlite(p.value())).collect()
}

fn value_to_rusqlite(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(i64::from(*b)),
        Value::Int32(i) => Sql::Integer(i64::from(*i)),
        Value::Int64(i) => Sql::Integer(*i),
        Value::Float64(f) => Sql::Real(*f),
        Value::Decimal(d) => Sql::Text(d.clone()),
        Value::String(s) => Sql::Text(s.clone()),
        Value::Bytes(b) => Sql::Blob(b.clone()),
        Value::DateTimeTz(dt) => Sql::Text(dt.format(SQLITE_DATETIME_TZ_LAYOUT).to_string()),
        Value::Date(_) | Value::Time(_) | Value::DateTime(_) => Sql::Text(value.to_string()),
    }
}

fn rusqlite_to_value(row: &rusqlite::Row, idx: usize) -> Result<Value> {
    use rusqlite::types::ValueRef;

    let value_ref = row
        .get_ref(idx)
        .map_err(|e| GridsqlError::Query(e.to_string()))?;

    let value = match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        // text stored in untyped columns can arrive as a blob
        ValueRef::Blob(b) => match std::str::from_utf8(b) {
            Ok(s) => Value::String(s.to_string()),
            Err(_) => Value::Bytes(b.to_vec()),
        },
    };

    Ok(value)
}
