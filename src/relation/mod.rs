//! Relation traversal paths.
//!
//! A [`Relation`] is a left-deep path of joins starting at a root table.
//! Every table occurrence in the path is a node, identified by its position
//! ([`NodeId`]); node 0 is always the root. Join conditions refer to earlier
//! nodes by id, so two relations describing the same traversal compare equal
//! regardless of how or where they were built.
//!
//! ```text
//! companies (0) ──LEFT JOIN relationships (1) ON 1.company_id = 0.id
//!                 ──LEFT JOIN people (2)      ON 2.id = 1.person_id
//! ```

mod join_tree;

pub use join_tree::{JoinTree, NodeMap};

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::cache::IndexCache;
use crate::executor::{ExecResult, QueryExecutor};
use crate::sql::{field, lit_str, Expr, ExprExt, JoinType};

/// Errors raised while combining relations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelationError {
    #[error("relation rooted at '{found}' cannot be attached to a tree rooted at '{expected}'")]
    RootMismatch { expected: String, found: String },

    #[error("join condition of step {step} refers to node {node}, which does not precede it")]
    ForwardReference { step: usize, node: NodeId },
}

/// Position of a table occurrence inside a relation (0 = root).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A column of a specific node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub node: NodeId,
    pub column: String,
}

impl ColumnRef {
    pub fn new(node: NodeId, column: &str) -> Self {
        Self {
            node,
            column: column.into(),
        }
    }

    /// A column of the root node.
    pub fn root(column: &str) -> Self {
        Self::new(NodeId::ROOT, column)
    }
}

/// One equality in a join condition. The left side is always a column of
/// the table being joined.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JoinOn {
    /// `joined.column = <node>.column`
    Column { column: String, references: ColumnRef },
    /// `joined.column = 'value'` (polymorphic type discriminators)
    Value { column: String, value: String },
}

impl JoinOn {
    pub fn column(column: &str, references: ColumnRef) -> Self {
        JoinOn::Column {
            column: column.into(),
            references,
        }
    }

    pub fn value(column: &str, value: &str) -> Self {
        JoinOn::Value {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Column of the joined table this condition constrains.
    pub fn target_column(&self) -> &str {
        match self {
            JoinOn::Column { column, .. } | JoinOn::Value { column, .. } => column,
        }
    }

    /// Same condition with the referenced node rewritten by `f`.
    pub(crate) fn map_node(&self, f: impl Fn(NodeId) -> NodeId) -> JoinOn {
        match self {
            JoinOn::Column { column, references } => JoinOn::Column {
                column: column.clone(),
                references: ColumnRef::new(f(references.node), &references.column),
            },
            JoinOn::Value { .. } => self.clone(),
        }
    }
}

/// A join from the relation so far onto one more table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinStep {
    pub table: String,
    pub kind: JoinType,
    pub on: Vec<JoinOn>,
}

impl JoinStep {
    /// Columns of the joined table fixed by the join condition.
    pub fn target_columns(&self) -> BTreeSet<&str> {
        self.on.iter().map(JoinOn::target_column).collect()
    }
}

/// A relation traversal path from a root table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relation {
    root: String,
    steps: Vec<JoinStep>,
}

impl Relation {
    /// The bare root table, no joins.
    pub fn new(root: &str) -> Self {
        Self {
            root: root.into(),
            steps: vec![],
        }
    }

    /// Append a join step. Conditions may only refer to nodes already in the path.
    pub fn join(mut self, table: &str, kind: JoinType, on: Vec<JoinOn>) -> Result<Self, RelationError> {
        let step = self.steps.len();
        let next = self.last_node();
        for cond in &on {
            if let JoinOn::Column { references, .. } = cond {
                if references.node > next {
                    return Err(RelationError::ForwardReference {
                        step,
                        node: references.node,
                    });
                }
            }
        }
        self.steps.push(JoinStep {
            table: table.into(),
            kind,
            on,
        });
        Ok(self)
    }

    /// `LEFT JOIN table ON table.column = references`
    pub fn left_join(self, table: &str, column: &str, references: ColumnRef) -> Result<Self, RelationError> {
        self.join(table, JoinType::Left, vec![JoinOn::column(column, references)])
    }

    /// `INNER JOIN table ON table.column = references`
    pub fn inner_join(self, table: &str, column: &str, references: ColumnRef) -> Result<Self, RelationError> {
        self.join(table, JoinType::Inner, vec![JoinOn::column(column, references)])
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn steps(&self) -> &[JoinStep] {
        &self.steps
    }

    /// Whether the path joins anything beyond its root.
    pub fn has_join(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Node the path ends at (the root for a bare relation).
    pub fn last_node(&self) -> NodeId {
        NodeId(self.steps.len())
    }

    /// Number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.steps.len() + 1
    }

    /// Table of a node, if the node is part of this path.
    pub fn table_of(&self, node: NodeId) -> Option<&str> {
        if node.is_root() {
            Some(&self.root)
        } else {
            self.steps.get(node.0 - 1).map(|s| s.table.as_str())
        }
    }

    /// Table the path ends at.
    pub fn last_table(&self) -> &str {
        self.steps.last().map(|s| s.table.as_str()).unwrap_or(&self.root)
    }

    /// Join condition of the step that introduced `node`, as a node-bound predicate.
    pub fn join_predicate(&self, node: NodeId) -> Option<Expr> {
        if node.is_root() {
            return None;
        }
        let step = self.steps.get(node.0 - 1)?;
        Expr::conjoin(step.on.iter().map(|cond| match cond {
            JoinOn::Column { column, references } => {
                field(node, column).eq(field(references.node, &references.column))
            }
            JoinOn::Value { column, value } => field(node, column).eq(lit_str(value)),
        }))
    }

    /// Whether every step matches at most one row per row of the path so far.
    ///
    /// A step is singular when the columns its condition fixes on the joined
    /// table cover a unique index of that table. `primary_key` names the key
    /// column of a table; indexes come from `cache`, filled from `executor`
    /// on first use.
    pub fn is_singular<F>(&self, cache: &IndexCache, executor: &dyn QueryExecutor, primary_key: F) -> ExecResult<bool>
    where
        F: Fn(&str) -> String,
    {
        for step in &self.steps {
            let fixed = step.target_columns();
            let indexes = cache.unique_indexes(executor, &step.table, &primary_key(&step.table))?;
            let covered = indexes
                .iter()
                .any(|idx| idx.columns.iter().all(|c| fixed.contains(c.as_str())));
            if !covered {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for step in &self.steps {
            write!(f, " -> {}", step.table)?;
        }
        Ok(())
    }
}
