//! gridsql edit engine
//!
//! Turns edits made to a fetched result grid into `INSERT`/`UPDATE`/`DELETE`
//! statements and drives each one through an interactive confirm/execute
//! protocol inside a lazily opened transaction.
//!
//! - [`ColumnRule`] - per-column validation and coercion
//! - [`DmlCompiler`] - row diff to dialect-specific SQL
//! - [`ChangeApplier`] - the confirm/execute state machine
//! - [`AuditLog`] - spool output with timestamped entries
//! - [`EditSession`] - the edit flow, raw statements and transaction control

mod audit;
mod compiler;
mod confirm;
mod error;
mod grid;
mod rule;
mod session;

pub use audit::{AuditLog, CrlfWriter, open_spool};
pub use compiler::{CompiledStatement, DmlCompiler, StatementKind};
pub use confirm::{ChangeApplier, ExecutionState, KeySource, LineKeys, Outcome, ScriptedKeys};
pub use error::{EditError, Result};
pub use grid::{CellValidator, EditCell, EditOutcome, EditRequest, EditRow, RowChange, Spreadsheet};
pub use rule::{ColumnKind, ColumnRule};
pub use session::{DEFAULT_NULL, EditSession, EditSummary, RawOutcome, SessionSettings};
