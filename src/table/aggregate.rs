//! Summary aggregates over table columns.

use serde::{Deserialize, Serialize};

use super::Table;
use crate::model::Value;

/// How an aggregate folds a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    /// Sum of the non-null values; NULL when there are none.
    Sum,
    /// Number of rows.
    Count,
    /// Non-empty values joined with `", "`.
    Concat,
}

/// An aggregate over one column.
///
/// `reduce` is idempotent over nesting: reducing the reductions of a
/// partition equals reducing the whole list. Group summaries rely on this
/// to roll subgroup results up instead of revisiting every row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Aggregate {
    column: String,
    kind: AggregateKind,
}

impl Aggregate {
    pub fn new(column: &str, kind: AggregateKind) -> Self {
        Self {
            column: column.into(),
            kind,
        }
    }

    pub fn sum(column: &str) -> Self {
        Self::new(column, AggregateKind::Sum)
    }

    pub fn count(column: &str) -> Self {
        Self::new(column, AggregateKind::Count)
    }

    pub fn concat(column: &str) -> Self {
        Self::new(column, AggregateKind::Concat)
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn kind(&self) -> AggregateKind {
        self.kind
    }

    /// Values of a table to reduce. A table without the column maps to nothing.
    pub fn map(&self, table: &Table) -> Vec<Value> {
        if self.kind == AggregateKind::Count {
            return vec![Value::Int(table.len() as i64)];
        }
        match table.column_index(&self.column) {
            Some(idx) => table
                .rows()
                .iter()
                .map(|row| row.get(idx).cloned().unwrap_or(Value::Null))
                .collect(),
            None => vec![],
        }
    }

    pub fn reduce(&self, values: Vec<Value>) -> Value {
        match self.kind {
            AggregateKind::Sum | AggregateKind::Count => sum(values),
            AggregateKind::Concat => {
                let parts: Vec<String> = values
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(Value::to_string)
                    .filter(|s| !s.is_empty())
                    .collect();
                Value::Text(parts.join(", "))
            }
        }
    }
}

fn sum(values: Vec<Value>) -> Value {
    let mut acc: Option<Value> = None;
    for v in values {
        let v = match v {
            Value::Null => continue,
            Value::Bool(b) => Value::Int(b as i64),
            Value::Int(_) | Value::Float(_) => v,
            other => match other.as_f64() {
                Some(f) => Value::Float(f),
                None => continue,
            },
        };
        acc = Some(match (acc, v) {
            (None, v) => v,
            (Some(Value::Int(a)), Value::Int(b)) => match a.checked_add(b) {
                Some(n) => Value::Int(n),
                None => Value::Float(a as f64 + b as f64),
            },
            (Some(a), b) => Value::Float(a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0)),
        });
    }
    acc.unwrap_or(Value::Null)
}
