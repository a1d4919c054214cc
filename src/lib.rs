//! # reportkit
//!
//! Tabular and grouped reports over relational data, with columns reached
//! through associations and SQL aggregates, without join-induced row
//! duplication.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Schema (entities, associations, columns)          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [report]
//! ┌─────────────────────────────────────────────────────────┐
//! │     Columns → FieldRefs (relation + field, singular?)    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner]
//! ┌─────────────────────────────────────────────────────────┐
//! │   BucketList: bucketize → consolidate → join trees       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [executor]
//! ┌─────────────────────────────────────────────────────────┐
//! │   main query, then one query per extra bucket (by key)   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [table]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Table → Groups → summaries, JSON export           │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod executor;
pub mod model;
pub mod planner;
pub mod relation;
pub mod report;
pub mod schema;
pub mod sql;
pub mod table;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::cache::IndexCache;
    pub use crate::config::{ConnectionConfig, Settings};
    pub use crate::executor::{QueryExecutor, QueryLog, SqliteExecutor};
    pub use crate::model::{AggregateFn, Column, ColumnKind, FormatOptions, Value};
    pub use crate::relation::{ColumnRef, NodeId, Relation};
    pub use crate::report::{Criterion, Report, ReportContext, ReportError, ReportResult};
    pub use crate::schema::{Association, Entity, Schema};
    pub use crate::sql::{
        col, field, lit_bool, lit_float, lit_int, lit_null, lit_str, Dialect, Expr, ExprExt, SortDir,
    };
    pub use crate::table::{Aggregate, Group, Grouping, Node, Table};
}
