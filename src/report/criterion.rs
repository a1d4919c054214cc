//! Filters and base conditions assigned to a report.

use crate::relation::{NodeId, Relation};
use crate::sql::Expr;

/// A restriction on the records a report covers.
///
/// Predicates are node-bound ([`crate::sql::field`]); they are bound to
/// table aliases only when the query is built.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Predicate over the root table alone.
    Predicate(Expr),
    /// Predicate over the nodes of a relation rooted at the report's table.
    /// A relation with joins is resolved to a key list before the main query.
    Scope {
        relation: Relation,
        predicate: Option<Expr>,
    },
}

impl Criterion {
    pub fn predicate(expr: Expr) -> Self {
        Criterion::Predicate(expr)
    }

    pub fn scope(relation: Relation, predicate: Expr) -> Self {
        Criterion::Scope {
            relation,
            predicate: Some(predicate),
        }
    }

    /// Every record reachable through `relation` (inner joins drop the rest).
    pub fn within(relation: Relation) -> Self {
        Criterion::Scope {
            relation,
            predicate: None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Criterion::Predicate(_) => "predicate",
            Criterion::Scope { .. } => "scope",
        }
    }
}

/// First node `expr` mentions that is not below `node_count`.
pub(crate) fn foreign_node(expr: &Expr, node_count: usize) -> Option<NodeId> {
    expr.nodes().into_iter().find(|n| n.0 >= node_count)
}
