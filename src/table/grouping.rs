//! Grouping of sorted rows into a tree with per-group summaries.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::{Aggregate, Node, Table, TableError, TableResult};
use crate::model::{Column, Value};

/// One grouping level: the key column, the aggregates summarised per
/// group, and optionally the next level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    column: String,
    aggregates: Vec<Aggregate>,
    child: Option<Box<Grouping>>,
}

impl Grouping {
    pub fn new(column: &str) -> Self {
        Self {
            column: column.into(),
            aggregates: vec![],
            child: None,
        }
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregates.push(aggregate);
        self
    }

    /// Group every run again by `child`, below the deepest level so far.
    pub fn then(mut self, child: Grouping) -> Self {
        self.child = Some(Box::new(match self.child.take() {
            Some(existing) => existing.then(child),
            None => child,
        }));
        self
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn aggregates(&self) -> &[Aggregate] {
        &self.aggregates
    }

    /// Split `table` into groups of contiguous equal keys.
    ///
    /// Rows are not sorted here: a key that comes back after another key
    /// starts a new group.
    pub fn group(&self, table: &Table) -> TableResult<Vec<Group>> {
        self.group_rows(table.rows().to_vec(), table.columns(), table.level())
    }

    fn group_rows(
        &self,
        rows: Vec<Vec<Value>>,
        columns: &[Arc<Column>],
        level: usize,
    ) -> TableResult<Vec<Group>> {
        let idx = columns
            .iter()
            .position(|c| c.name() == self.column)
            .ok_or_else(|| TableError::UnknownColumn(self.column.clone()))?;
        let key_column = &columns[idx];
        let remaining: Vec<Arc<Column>> = columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, c)| Arc::clone(c))
            .collect();

        let mut groups = Vec::new();
        let mut run: Vec<Vec<Value>> = Vec::new();
        for row in rows {
            if run.first().is_some_and(|first| first[idx] != row[idx]) {
                let done = std::mem::take(&mut run);
                groups.push(self.create_group(done, idx, key_column, &remaining, level)?);
            }
            run.push(row);
        }
        if !run.is_empty() {
            groups.push(self.create_group(run, idx, key_column, &remaining, level)?);
        }
        Ok(groups)
    }

    fn create_group(
        &self,
        run: Vec<Vec<Value>>,
        idx: usize,
        key_column: &Column,
        columns: &[Arc<Column>],
        level: usize,
    ) -> TableResult<Group> {
        let key = run[0][idx].clone();
        let rows: Vec<Vec<Value>> = run
            .into_iter()
            .map(|mut row| {
                row.remove(idx);
                row
            })
            .collect();

        let children = match &self.child {
            Some(child) => child
                .group_rows(rows, columns, level + 1)?
                .into_iter()
                .map(Reportable::Group)
                .collect(),
            None => vec![Reportable::Table(Table::with_level(
                rows,
                columns.to_vec(),
                level + 1,
            )?)],
        };

        Ok(Group {
            name: key_column.format(&key),
            key,
            children,
            columns: columns.to_vec(),
            level,
            aggregates: self.aggregates.clone(),
            summary: OnceCell::new(),
        })
    }
}

/// A child of a group: a nested group or a table of rows.
#[derive(Debug, Clone)]
pub enum Reportable {
    Group(Group),
    Table(Table),
}

impl Reportable {
    pub fn aggregate(&self, aggregate: &Aggregate) -> Value {
        match self {
            Reportable::Group(g) => g.aggregate(aggregate),
            Reportable::Table(t) => t.aggregate(aggregate),
        }
    }

    pub fn traverse<'a>(&'a self, visit: &mut dyn FnMut(Node<'a>)) {
        match self {
            Reportable::Group(g) => g.traverse(visit),
            Reportable::Table(t) => t.traverse(visit),
        }
    }

    /// Data rows below this node.
    pub fn row_count(&self) -> usize {
        match self {
            Reportable::Group(g) => g.row_count(),
            Reportable::Table(t) => t.len(),
        }
    }
}

/// Rows sharing one key, with a summary computed on first use.
#[derive(Debug, Clone)]
pub struct Group {
    name: String,
    key: Value,
    children: Vec<Reportable>,
    columns: Vec<Arc<Column>>,
    level: usize,
    aggregates: Vec<Aggregate>,
    summary: OnceCell<Table>,
}

impl Group {
    /// The key, formatted by the grouping column.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &Value {
        &self.key
    }

    pub fn children(&self) -> &[Reportable] {
        &self.children
    }

    pub fn columns(&self) -> &[Arc<Column>] {
        &self.columns
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn aggregates(&self) -> &[Aggregate] {
        &self.aggregates
    }

    pub fn row_count(&self) -> usize {
        self.children.iter().map(Reportable::row_count).sum()
    }

    /// Reduce the children's own reductions.
    pub fn aggregate(&self, aggregate: &Aggregate) -> Value {
        aggregate.reduce(self.children.iter().map(|c| c.aggregate(aggregate)).collect())
    }

    /// One row: each column's aggregate, NULL where none is defined.
    pub fn summary(&self) -> &Table {
        self.summary.get_or_init(|| {
            let row = self
                .columns
                .iter()
                .map(|col| {
                    self.aggregates
                        .iter()
                        .find(|a| a.column() == col.name())
                        .map_or(Value::Null, |a| self.aggregate(a))
                })
                .collect();
            Table::summary(row, self.columns.clone(), self.level)
        })
    }

    /// Depth-first: this group, every child, then the summary.
    pub fn traverse<'a>(&'a self, visit: &mut dyn FnMut(Node<'a>)) {
        visit(Node::Group(self));
        for child in &self.children {
            child.traverse(visit);
        }
        visit(Node::Table(self.summary()));
    }
}
