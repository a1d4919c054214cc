//! Statement recording.

use std::sync::Mutex;

use super::{ExecResult, IndexInfo, QueryExecutor, Row};
use crate::sql::{Dialect, Query};

/// Wraps an executor and records every SELECT and COUNT it runs.
///
/// Index lookups are metadata reads and are not recorded.
pub struct QueryLog<E> {
    inner: E,
    statements: Mutex<Vec<String>>,
}

impl<E: QueryExecutor> QueryLog<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Number of statements executed since creation or the last reset.
    pub fn query_count(&self) -> usize {
        self.lock().len()
    }

    /// Rendered statements, oldest first.
    pub fn statements(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    fn record(&self, query: &Query) {
        let sql = query.to_sql(self.inner.dialect());
        self.lock().push(sql);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        // A poisoned log only means a recording thread panicked; the entries are intact.
        self.statements.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<E: QueryExecutor> QueryExecutor for QueryLog<E> {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    fn select_rows(&self, query: &Query) -> ExecResult<Vec<Row>> {
        self.record(query);
        self.inner.select_rows(query)
    }

    fn count(&self, query: &Query) -> ExecResult<u64> {
        self.record(query);
        self.inner.count(query)
    }

    fn indexes(&self, table: &str) -> ExecResult<Vec<IndexInfo>> {
        self.inner.indexes(table)
    }
}
