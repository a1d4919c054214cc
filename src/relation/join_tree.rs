//! Join trees: several relations merged into one FROM clause.
//!
//! Relations attached to the same tree share joins whose table, join kind
//! and (translated) condition match. A table that appears again under a
//! different condition gets a fresh alias (`people_2`, `people_3`, ...).

use std::collections::{HashMap, HashSet};

use super::{JoinOn, NodeId, Relation, RelationError};
use crate::sql::{field, lit_str, Expr, ExprExt, JoinType, Query, TableRef, UnboundNode};

#[derive(Debug, Clone, PartialEq)]
struct TreeNode {
    table: String,
    alias: String,
    kind: JoinType,
    /// Join condition, with references translated to tree node ids.
    on: Vec<JoinOn>,
    fans_out: bool,
}

/// Where the nodes of one attached relation ended up in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMap(Vec<NodeId>);

impl NodeMap {
    /// Tree node for a relation node.
    pub fn get(&self, node: NodeId) -> Option<NodeId> {
        self.0.get(node.0).copied()
    }

    /// Tree node the attached relation ends at.
    pub fn last(&self) -> NodeId {
        self.0.last().copied().unwrap_or(NodeId::ROOT)
    }
}

/// A FROM clause under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinTree {
    nodes: Vec<TreeNode>,
    aliases: HashSet<String>,
}

impl JoinTree {
    pub fn new(root: &str) -> Self {
        Self {
            nodes: vec![TreeNode {
                table: root.into(),
                alias: root.into(),
                kind: JoinType::Inner,
                on: vec![],
                fans_out: false,
            }],
            aliases: HashSet::from([root.to_string()]),
        }
    }

    pub fn root(&self) -> &str {
        &self.nodes[0].table
    }

    /// Merge a relation into the tree, reusing equivalent joins.
    ///
    /// Nodes created for a relation with `fans_out` set are marked as
    /// multiplying rows; a tree with such a node needs grouping to keep one
    /// row per root record.
    pub fn attach(&mut self, relation: &Relation, fans_out: bool) -> Result<NodeMap, RelationError> {
        if relation.root() != self.root() {
            return Err(RelationError::RootMismatch {
                expected: self.root().to_string(),
                found: relation.root().to_string(),
            });
        }

        let mut mapping = vec![NodeId::ROOT];
        for step in relation.steps() {
            let on: Vec<JoinOn> = step
                .on
                .iter()
                .map(|cond| cond.map_node(|n| mapping[n.0]))
                .collect();

            let existing = self.join_index().get(step.table.as_str()).and_then(|candidates| {
                candidates.iter().copied().find(|id| {
                    let node = &self.nodes[id.0];
                    node.kind == step.kind && node.on == on
                })
            });

            let id = match existing {
                Some(id) => {
                    if fans_out {
                        self.nodes[id.0].fans_out = true;
                    }
                    id
                }
                None => {
                    let alias = self.fresh_alias(&step.table);
                    self.nodes.push(TreeNode {
                        table: step.table.clone(),
                        alias,
                        kind: step.kind,
                        on,
                        fans_out,
                    });
                    NodeId(self.nodes.len() - 1)
                }
            };
            mapping.push(id);
        }
        Ok(NodeMap(mapping))
    }

    /// Joined nodes, grouped by table name.
    pub fn join_index(&self) -> HashMap<&str, Vec<NodeId>> {
        let mut index: HashMap<&str, Vec<NodeId>> = HashMap::new();
        for (i, node) in self.nodes.iter().enumerate().skip(1) {
            index.entry(node.table.as_str()).or_default().push(NodeId(i));
        }
        index
    }

    fn fresh_alias(&mut self, table: &str) -> String {
        let mut alias = table.to_string();
        let mut n = 2;
        while self.aliases.contains(&alias) {
            alias = format!("{table}_{n}");
            n += 1;
        }
        self.aliases.insert(alias.clone());
        alias
    }

    /// Alias of a tree node.
    pub fn alias(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).map(|n| n.alias.as_str())
    }

    /// Alias the root table is referred to by.
    pub fn root_alias(&self) -> &str {
        &self.nodes[0].alias
    }

    pub fn has_join(&self) -> bool {
        self.nodes.len() > 1
    }

    /// Whether any join may match more than one row per root record.
    pub fn fans_out(&self) -> bool {
        self.nodes.iter().any(|n| n.fans_out)
    }

    /// Bind a predicate over `map`'s relation to the aliases of this tree.
    pub fn bind(&self, map: &NodeMap, expr: &Expr) -> Result<Expr, UnboundNode> {
        expr.bind(&|node| {
            map.get(node)
                .and_then(|id| self.alias(id))
                .map(str::to_string)
        })
    }

    /// Bind a predicate that only mentions the root node.
    pub fn bind_root(&self, expr: &Expr) -> Result<Expr, UnboundNode> {
        expr.bind(&|node| node.is_root().then(|| self.root_alias().to_string()))
    }

    /// Put the FROM clause and every join of this tree onto `query`.
    pub fn apply(&self, query: Query) -> Result<Query, UnboundNode> {
        let mut query = query.from(TableRef::new(self.root()));
        for (i, node) in self.nodes.iter().enumerate().skip(1) {
            let on = Expr::conjoin(node.on.iter().map(|cond| match cond {
                JoinOn::Column { column, references } => {
                    field(NodeId(i), column).eq(field(references.node, &references.column))
                }
                JoinOn::Value { column, value } => field(NodeId(i), column).eq(lit_str(value)),
            }));
            let Some(on) = on else {
                continue;
            };
            let on = on.bind(&|id| self.alias(id).map(str::to_string))?;
            query = query.join(
                node.kind,
                TableRef::new(&node.table).with_alias(&node.alias),
                on,
            );
        }
        Ok(query)
    }
}
