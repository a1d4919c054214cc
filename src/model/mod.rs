//! Report data model: cell values, column kinds, formatting, columns.
//!
//! - [`value`] - raw and cast cell values
//! - [`kind`] - the closed set of column kinds with their cast/format rules
//! - [`format`] - user formatting options
//! - [`field`] - field references into relations
//! - [`column`] - named report columns

pub mod column;
pub mod field;
pub mod format;
pub mod kind;
pub mod value;

pub use column::Column;
pub use field::{AggregateFn, FieldOp, FieldRef, FieldSpec, Operand};
pub use format::{DurationFormat, FormatOptions, FormatParams};
pub use kind::ColumnKind;
pub use value::{RowKey, Value};

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("column '{column}' reads field '{field}', which no query projected")]
    MissingProjection { column: String, field: String },
}
