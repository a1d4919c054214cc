//! Query execution.
//!
//! The planner only builds [`Query`] values; running them is the job of a
//! [`QueryExecutor`]. [`SqliteExecutor`] is the reference backend and
//! [`QueryLog`] wraps any executor to record the SQL it was asked to run.
//!
//! # Example
//!
//! ```ignore
//! use reportkit::executor::{QueryExecutor, SqliteExecutor};
//! use reportkit::sql::{col, Query, TableRef};
//!
//! let exec = SqliteExecutor::open_in_memory()?;
//! exec.execute_batch("CREATE TABLE people (id INTEGER PRIMARY KEY, first_name TEXT)")?;
//! let rows = exec.select_rows(&Query::new().select(vec![col("id")]).from(TableRef::new("people")))?;
//! ```

mod log;
mod sqlite;

pub use log::QueryLog;
pub use sqlite::SqliteExecutor;

use thiserror::Error;

use crate::config::ConnectionError;
use crate::model::Value;
use crate::sql::{Dialect, Query};

/// One result row, cells in SELECT order.
pub type Row = Vec<Value>;

/// Result type for execution.
pub type ExecResult<T> = Result<T, ExecError>;

/// Errors raised by an executor. The planner propagates them unchanged.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("COUNT query returned no integer: {0}")]
    InvalidCount(String),

    #[error("unsupported by this executor: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// An index as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    /// Indexed columns, in index order.
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Runs planner queries against a database.
///
/// Implementations render the query in their own [`dialect`](Self::dialect)
/// and return raw cells; casting happens in the report layer.
pub trait QueryExecutor {
    /// Dialect queries are rendered in.
    fn dialect(&self) -> Dialect;

    /// Execute a SELECT and return every row.
    fn select_rows(&self, query: &Query) -> ExecResult<Vec<Row>>;

    /// Execute a single-cell COUNT query.
    fn count(&self, query: &Query) -> ExecResult<u64> {
        let rows = self.select_rows(query)?;
        match rows.first().and_then(|row| row.first()) {
            Some(Value::Int(n)) if *n >= 0 => Ok(*n as u64),
            Some(other) => Err(ExecError::InvalidCount(other.to_string())),
            None => Err(ExecError::InvalidCount("no rows".into())),
        }
    }

    /// Indexes of a table, unique or not.
    fn indexes(&self, table: &str) -> ExecResult<Vec<IndexInfo>>;
}
