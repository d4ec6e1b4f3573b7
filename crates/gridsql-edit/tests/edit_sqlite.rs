//! Edit flow against an in-memory SQLite database

use anyhow::Result;
use gridsql_core::{Connection, Value};
use gridsql_drivers::{DialectRegistry, DriverRegistry};
use gridsql_edit::{
    DEFAULT_NULL, EditCell, EditError, EditOutcome, EditRequest, EditRow, EditSession, RawOutcome,
    ScriptedKeys, SessionSettings, Spreadsheet,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Grid that applies a fixed edit to whatever it is shown
struct ScriptedGrid<F> {
    edit: F,
    seen: Vec<Vec<String>>,
}

impl<F> ScriptedGrid<F>
where
    F: FnMut(&[Vec<String>]) -> Option<EditOutcome>,
{
    fn new(edit: F) -> Self {
        Self {
            edit,
            seen: Vec::new(),
        }
    }
}

impl<F> Spreadsheet for ScriptedGrid<F>
where
    F: FnMut(&[Vec<String>]) -> Option<EditOutcome>,
{
    fn edit(&mut self, request: EditRequest<'_>) -> gridsql_edit::Result<Option<EditOutcome>> {
        self.seen = request.rows.to_vec();
        Ok((self.edit)(request.rows))
    }
}

#[derive(Clone, Default)]
struct Spool(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for Spool {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Spool {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

async fn session() -> Result<EditSession> {
    let info = DialectRegistry::with_defaults()
        .find_from_args(&["sqlite3".to_string(), ":memory:".to_string()])?;
    let conn = DriverRegistry::with_defaults().connect(&info).await?;
    conn.execute(
        "CREATE TABLE TESTTBL (id INTEGER, name TEXT, created DATETIME)",
        &[],
    )
    .await?;
    conn.execute(
        "INSERT INTO TESTTBL VALUES (1, 'alpha', '2024-05-25 13:45:33'), (2, 'beta', NULL), (3, NULL, NULL)",
        &[],
    )
    .await?;
    Ok(EditSession::new(conn, info.dialect, SessionSettings::default()))
}

async fn dump(session: &EditSession) -> Result<Vec<Vec<Value>>> {
    let result = session.query("SELECT * FROM TESTTBL ORDER BY id").await?;
    Ok(result.rows.into_iter().map(|r| r.values).collect())
}

fn text(s: &str) -> Value {
    Value::String(s.to_string())
}

#[tokio::test]
async fn test_update_insert_delete_round() -> Result<()> {
    let mut session = session().await?;
    let mut grid = ScriptedGrid::new(|rows: &[Vec<String>]| {
        let mut first = EditRow::fetched(&rows[0]);
        first.cells[1].set_text("ALPHA");
        let untouched = EditRow::fetched(&rows[2]);
        let added = EditRow::new(vec![
            EditCell::added("4"),
            EditCell::added("delta"),
            EditCell::added("2024-06-01 00:00:00"),
        ]);
        let synthetic = EditRow::new(vec![
            EditCell::added("9"),
            EditCell::added("ghost"),
            EditCell::added(DEFAULT_NULL),
        ]);
        Some(EditOutcome {
            rows: vec![first, untouched, added],
            removed: vec![EditRow::fetched(&rows[1]), synthetic],
        })
    });
    let mut keys = ScriptedKeys::new("yyy");
    let mut term = Vec::new();

    let summary = session
        .edit("TESTTBL ORDER BY id", &mut grid, &mut keys, &mut term)
        .await?;
    assert_eq!(summary.applied, 3);
    assert_eq!(summary.failed, 0);
    assert!(session.has_transaction());

    assert_eq!(grid.seen[1], vec!["2", "beta", DEFAULT_NULL]);
    assert_eq!(grid.seen[0][2], "2024-05-25 13:45:33");

    session.commit(&mut term).await?;
    assert!(!session.has_transaction());
    assert_eq!(
        dump(&session).await?,
        vec![
            vec![Value::Int64(1), text("ALPHA"), text("2024-05-25 13:45:33")],
            vec![Value::Int64(3), Value::Null, Value::Null],
            vec![Value::Int64(4), text("delta"), text("2024-06-01 00:00:00")],
        ]
    );

    let output = String::from_utf8(term)?;
    assert!(output.contains(
        "UPDATE  TESTTBL\n   SET  name = $v1\n WHERE  id = $v2\n   AND  name = $v3\n   AND  datetime(created) = datetime($v4)"
    ));
    assert!(output.contains("INSERT INTO TESTTBL VALUES\n( $v1,$v2,datetime($v3) )"));
    assert!(output.contains("DELETE FROM TESTTBL\n WHERE  id = $v1\n   AND  name = $v2\n   AND  created IS NULL"));
    assert_eq!(output.matches("Starts a transaction").count(), 1);
    assert!(output.ends_with("Commit complete.\n"));
    Ok(())
}

#[tokio::test]
async fn test_discard_all_touches_nothing() -> Result<()> {
    let mut session = session().await?;
    let mut grid = ScriptedGrid::new(|rows: &[Vec<String>]| {
        let mut first = EditRow::fetched(&rows[0]);
        first.cells[1].set_text("changed");
        Some(EditOutcome {
            rows: vec![first],
            removed: vec![EditRow::fetched(&rows[1]), EditRow::fetched(&rows[2])],
        })
    });
    let mut keys = ScriptedKeys::new("N");
    let mut term = Vec::new();

    let summary = session
        .edit("TESTTBL", &mut grid, &mut keys, &mut term)
        .await?;
    assert_eq!(summary.cancelled, 3);
    assert_eq!(summary.applied, 0);
    assert!(!session.has_transaction());
    assert_eq!(dump(&session).await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_zero_rows_rolls_back_and_asks_to_continue() -> Result<()> {
    let mut session = session().await?;
    let spool = Spool::default();
    session.set_spool(Some(Box::new(spool.clone())))?;
    let mut grid = ScriptedGrid::new(|_: &[Vec<String>]| {
        // original no longer matches any row
        let stale = EditRow::new(vec![
            EditCell::fetched("1"),
            EditCell::changed("gone", "x"),
            EditCell::fetched(DEFAULT_NULL),
        ]);
        Some(EditOutcome {
            rows: vec![stale],
            removed: vec![EditRow::fetched(&["2", "beta", DEFAULT_NULL])],
        })
    });
    let mut keys = ScriptedKeys::new("ya");
    let mut term = Vec::new();

    let summary = session
        .edit("TESTTBL", &mut grid, &mut keys, &mut term)
        .await?;
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.cancelled, 1);
    assert!(!session.has_transaction());
    assert_eq!(dump(&session).await?.len(), 3);

    let output = String::from_utf8(term)?;
    assert!(output.contains("no rows affected\nUPDATE  TESTTBL"));
    assert!(output.contains("Continue or abort [c/a] a\n"));

    let log = spool.text();
    assert!(log.contains("# args: [v1='x', v2=1, v3='gone']"));
    assert!(log.contains("# (error) no rows affected"));
    assert!(log.contains("# (cancel) DELETE FROM TESTTBL"));
    Ok(())
}

#[tokio::test]
async fn test_rejected_row_is_counted_and_others_run() -> Result<()> {
    let mut session = session().await?;
    let mut grid = ScriptedGrid::new(|rows: &[Vec<String>]| {
        let bad = EditRow::new(vec![
            EditCell::added("four"),
            EditCell::added("x"),
            EditCell::added(DEFAULT_NULL),
        ]);
        let mut good = EditRow::fetched(&rows[2]);
        good.cells[1].set_text("gamma");
        Some(EditOutcome {
            rows: vec![bad, good],
            removed: Vec::new(),
        })
    });
    let mut keys = ScriptedKeys::new("y");
    let mut term = Vec::new();

    let summary = session
        .edit("TESTTBL", &mut grid, &mut keys, &mut term)
        .await?;
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.applied, 1);
    assert!(String::from_utf8(term)?.contains("id: not a number"));

    let mut term = Vec::new();
    session.rollback(&mut term).await?;
    assert_eq!(dump(&session).await?[2][1], Value::Null);
    Ok(())
}

#[tokio::test]
async fn test_closed_grid_discards() -> Result<()> {
    let mut session = session().await?;
    let mut grid = ScriptedGrid::new(|_: &[Vec<String>]| None);
    let mut keys = ScriptedKeys::new("");
    let mut term = Vec::new();
    let summary = session
        .edit("TESTTBL WHERE id = 1", &mut grid, &mut keys, &mut term)
        .await?;
    assert_eq!(summary, Default::default());
    assert_eq!(grid.seen.len(), 1);
    assert!(term.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_raw_dml_auto_transaction() -> Result<()> {
    let mut session = session().await?;
    let mut term = Vec::new();

    let outcome = session
        .execute_raw("UPDATE TESTTBL SET name = 'z' WHERE id = 1;", &mut term)
        .await?;
    assert!(matches!(outcome, RawOutcome::Affected(1)));
    assert!(session.has_transaction());
    session.rollback(&mut term).await?;

    let outcome = session
        .execute_raw("DELETE FROM TESTTBL WHERE id = 42", &mut term)
        .await?;
    assert!(matches!(outcome, RawOutcome::Affected(0)));
    assert!(!session.has_transaction());

    let err = session
        .execute_raw("INSERT INTO missing VALUES (1)", &mut term)
        .await
        .unwrap_err();
    assert!(matches!(err, EditError::Database(_)));
    assert!(!session.has_transaction());

    let output = String::from_utf8(term)?;
    assert_eq!(output.matches("Starts a transaction").count(), 3);
    assert!(output.contains("1 record(s) updated.\nRollback complete.\n"));
    Ok(())
}

#[tokio::test]
async fn test_raw_statements_respect_open_transaction() -> Result<()> {
    let mut session = session().await?;
    let mut term = Vec::new();

    session
        .execute_raw("INSERT INTO TESTTBL VALUES (5, 'e', NULL)", &mut term)
        .await?;
    let err = session.execute_raw("VACUUM", &mut term).await.unwrap_err();
    assert!(matches!(err, EditError::TransactionOpen));
    assert_eq!(
        err.to_string(),
        "transaction is not closed. Please Commit or Rollback"
    );

    let outcome = session
        .execute_raw("CREATE TABLE other (a INTEGER)", &mut term)
        .await?;
    assert!(matches!(outcome, RawOutcome::Done));

    let outcome = session.execute_raw("PRAGMA table_info(other)", &mut term).await?;
    assert!(matches!(outcome, RawOutcome::Rows(ref r) if r.row_count() == 1));

    session.commit(&mut term).await?;
    let outcome = session.execute_raw("VACUUM", &mut term).await?;
    assert!(matches!(outcome, RawOutcome::Done));
    Ok(())
}

#[tokio::test]
async fn test_introspection() -> Result<()> {
    let session = session().await?;
    assert_eq!(session.tables().await?, vec!["TESTTBL".to_string()]);
    assert_eq!(
        session.columns("TESTTBL").await?,
        vec!["id".to_string(), "name".to_string(), "created".to_string()]
    );
    let desc = session.describe(Some("TESTTBL")).await?;
    assert_eq!(desc.row_count(), 3);
    let all = session.describe(None).await?;
    assert!(all.column_index("rootpage").is_some());
    Ok(())
}

#[tokio::test]
async fn test_cancelled_token_aborts_edit() -> Result<()> {
    let mut session = session().await?;
    let token = CancellationToken::new();
    token.cancel();
    session.set_cancel_token(token);
    let mut grid = ScriptedGrid::new(|_: &[Vec<String>]| None);
    let mut keys = ScriptedKeys::new("");
    let mut term = Vec::new();
    let err = session
        .edit("TESTTBL", &mut grid, &mut keys, &mut term)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    Ok(())
}
