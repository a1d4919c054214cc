//! Report results: flat tables, group trees and their summaries.
//!
//! A [`Table`] holds cast rows aligned with its columns. [`Grouping`]
//! splits a table into a tree of [`Group`]s, each ending in tables and
//! carrying a lazily computed summary row built from its [`Aggregate`]s.
//! [`Node`] is what a tree walk hands to its visitor.

mod aggregate;
mod grouping;

pub use aggregate::{Aggregate, AggregateKind};
pub use grouping::{Group, Grouping, Reportable};

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

use crate::model::{Column, Value};

/// Version tag of the flattened export structure.
pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("row has {found} cells, table has {expected} columns")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("table has no column '{0}'")]
    UnknownColumn(String),
}

pub type TableResult<T> = Result<T, TableError>;

/// Whether a table holds data rows or a group's summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Data,
    Summary,
}

impl TableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Data => "data",
            TableKind::Summary => "summary",
        }
    }
}

/// Cast rows with their columns.
#[derive(Debug, Clone)]
pub struct Table {
    rows: Vec<Vec<Value>>,
    columns: Vec<Arc<Column>>,
    level: usize,
    kind: TableKind,
}

impl Table {
    pub fn new(rows: Vec<Vec<Value>>, columns: Vec<Arc<Column>>) -> TableResult<Self> {
        Self::with_level(rows, columns, 0)
    }

    /// A data table nested `level` groups deep.
    pub fn with_level(rows: Vec<Vec<Value>>, columns: Vec<Arc<Column>>, level: usize) -> TableResult<Self> {
        if let Some(row) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(TableError::ShapeMismatch {
                expected: columns.len(),
                found: row.len(),
            });
        }
        Ok(Self {
            rows,
            columns,
            level,
            kind: TableKind::Data,
        })
    }

    pub(crate) fn summary(row: Vec<Value>, columns: Vec<Arc<Column>>, level: usize) -> Self {
        Self {
            rows: vec![row],
            columns,
            level,
            kind: TableKind::Summary,
        }
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn columns(&self) -> &[Arc<Column>] {
        &self.columns
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Vec<Value>> {
        self.rows.iter()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Values of one column, top to bottom.
    pub fn column_values(&self, name: &str) -> TableResult<Vec<&Value>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))?;
        Ok(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Pair each cell of `row` with its column.
    pub fn each_with_column<'a>(
        &'a self,
        row: &'a [Value],
    ) -> impl Iterator<Item = (&'a Value, &'a Arc<Column>)> + 'a {
        row.iter().zip(self.columns.iter())
    }

    /// Every cell rendered through its column's format.
    pub fn formatted(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| self.each_with_column(row).map(|(v, c)| c.format(v)).collect())
            .collect()
    }

    pub fn aggregate(&self, aggregate: &Aggregate) -> Value {
        aggregate.reduce(aggregate.map(self))
    }

    /// Walk this table. Tables are leaves: the visitor sees only the table.
    pub fn traverse<'a>(&'a self, visit: &mut dyn FnMut(Node<'a>)) {
        visit(Node::Table(self));
    }

    /// `{version, results, records}` with one name-to-value map per row.
    pub fn to_export(&self, count: u64) -> serde_json::Value {
        let records: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| {
                let record: serde_json::Map<String, serde_json::Value> = self
                    .each_with_column(row)
                    .map(|(v, c)| {
                        let value = serde_json::to_value(v).unwrap_or(serde_json::Value::Null);
                        (c.name().to_string(), value)
                    })
                    .collect();
                serde_json::Value::Object(record)
            })
            .collect();
        json!({
            "version": EXPORT_VERSION,
            "results": count,
            "records": records,
        })
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Vec<Value>;
    type IntoIter = std::slice::Iter<'a, Vec<Value>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// An element visited by a tree walk.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Group(&'a Group),
    Table(&'a Table),
}

impl Node<'_> {
    pub fn level(&self) -> usize {
        match self {
            Node::Group(g) => g.level(),
            Node::Table(t) => t.level(),
        }
    }

    /// "group", "data" or "summary".
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Group(_) => "group",
            Node::Table(t) => t.kind().as_str(),
        }
    }
}
