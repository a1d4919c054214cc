//! Report planner: spreads columns over join-safe queries.
//!
//! A report's fields are partitioned into buckets. Every bucket is one
//! SELECT whose joins never duplicate root rows; fields reached through
//! different one-to-many paths land in different buckets.
//!
//! 1. Bucketing: [`BucketList::bucketize`] places each field in the first
//!    bucket it is compatible with.
//! 2. Consolidation: [`BucketList::consolidate`] folds at most one extra
//!    bucket into the main one, picked by the report ordering.
//! 3. Stitching: [`BucketList::execute_and_join`] runs the remaining
//!    buckets restricted to the main result's keys and appends their cells.

pub mod bucket;
pub mod bucket_list;

pub use bucket::{Bucket, BucketQuery};
pub use bucket_list::BucketList;

use std::sync::Arc;

use thiserror::Error;

use crate::executor::ExecError;
use crate::model::{Column, ColumnKind, FieldRef};
use crate::relation::RelationError;
use crate::sql::UnboundNode;

/// Errors that can occur during planning.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("cannot order by {columns:?}: they are fetched by separate queries")]
    InvalidOrder { columns: Vec<String> },

    #[error(transparent)]
    Relation(#[from] RelationError),

    #[error(transparent)]
    Unbound(#[from] UnboundNode),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

pub type PlanResult<T> = Result<T, PlanError>;

/// Root table of a report and its primary key column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootKey {
    pub table: String,
    pub primary_key: String,
}

impl RootKey {
    pub fn new(table: &str, primary_key: &str) -> Self {
        Self {
            table: table.into(),
            primary_key: primary_key.into(),
        }
    }

    /// The primary key as a field reference.
    pub fn field(&self) -> FieldRef {
        FieldRef::primary_key(&self.table, &self.primary_key)
    }

    /// Synthetic column carrying the primary key.
    pub fn column(&self) -> Arc<Column> {
        Arc::new(Column::new(
            &self.primary_key,
            ColumnKind::Generic,
            vec![self.field()],
        ))
    }
}
