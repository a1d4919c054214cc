//! Unique-index cache.
//!
//! Singularity checks and GROUP BY prefix selection both need the indexes
//! of a table. Looking them up is a metadata round-trip, so the results are
//! kept here for the lifetime of the process.
//!
//! # Design
//!
//! - Injected explicitly (`Arc<IndexCache>`), shared by every report
//! - Populated on first miss from [`QueryExecutor::indexes`]
//! - Read-only after population, never invalidated
//! - The primary key always appears as a unique index
//!
//! # Key Format
//!
//! ```text
//! {table} -> [IndexInfo, ...]   (all indexes, primary key first)
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::executor::{ExecResult, IndexInfo, QueryExecutor};

/// Name given to the synthesized primary-key index.
pub const PRIMARY_INDEX: &str = "PRIMARY";

#[derive(Debug, Default)]
pub struct IndexCache {
    tables: DashMap<String, Arc<Vec<IndexInfo>>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every index of `table`, primary key included.
    pub fn all_indexes(
        &self,
        executor: &dyn QueryExecutor,
        table: &str,
        primary_key: &str,
    ) -> ExecResult<Arc<Vec<IndexInfo>>> {
        if let Some(hit) = self.tables.get(table) {
            return Ok(Arc::clone(hit.value()));
        }

        let mut indexes = executor.indexes(table)?;
        let has_primary = indexes
            .iter()
            .any(|idx| idx.unique && idx.columns.len() == 1 && idx.columns[0] == primary_key);
        if !has_primary {
            indexes.insert(
                0,
                IndexInfo {
                    name: PRIMARY_INDEX.into(),
                    columns: vec![primary_key.into()],
                    unique: true,
                },
            );
        }
        debug!(table, count = indexes.len(), "cached table indexes");

        // A concurrent miss may have filled the entry first; keep whichever landed.
        let entry = self
            .tables
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(indexes));
        Ok(Arc::clone(entry.value()))
    }

    /// Unique indexes of `table`, primary key included.
    pub fn unique_indexes(
        &self,
        executor: &dyn QueryExecutor,
        table: &str,
        primary_key: &str,
    ) -> ExecResult<Vec<IndexInfo>> {
        let all = self.all_indexes(executor, table, primary_key)?;
        Ok(all.iter().filter(|idx| idx.unique).cloned().collect())
    }

    /// Whether `table` has been looked up already.
    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
