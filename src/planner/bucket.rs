//! Buckets: fields that one SELECT can fetch without duplicating root rows.

use std::sync::Arc;

use super::{PlanResult, RootKey};
use crate::model::{Column, FieldRef};
use crate::relation::{JoinTree, NodeId, Relation};
use crate::sql::{col, field, Expr, ExprExt, Query, SelectExpr};

/// An ordered set of (field, column) pairs sharing one join tree.
///
/// Singular fields fit any bucket. Non-singular fields only share a bucket
/// with fields that traverse the exact same relation.
#[derive(Debug, Clone, Default)]
pub struct Bucket {
    fields: Vec<FieldRef>,
    columns: Vec<Arc<Column>>,
}

impl Bucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[FieldRef] {
        &self.fields
    }

    pub fn columns(&self) -> &[Arc<Column>] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Relation established by the first field.
    fn compare_relation(&self) -> Option<&Relation> {
        self.fields.first().map(FieldRef::relation)
    }

    pub fn compatible_with(&self, field: &FieldRef) -> bool {
        field.singular || Some(field.relation()) == self.compare_relation()
    }

    pub fn is_singular(&self) -> bool {
        self.fields.iter().all(|f| f.singular)
    }

    /// Whether every field of `column` is fetched by this bucket.
    pub fn includes(&self, column: &Column) -> bool {
        column.fields().iter().all(|f| self.fields.contains(f))
    }

    /// Whether any field of `column` is fetched by this bucket.
    pub fn touches(&self, column: &Column) -> bool {
        column.fields().iter().any(|f| self.fields.contains(f))
    }

    pub fn add(&mut self, field: FieldRef, column: Arc<Column>) -> &mut Self {
        self.fields.push(field);
        self.columns.push(column);
        self
    }

    /// A new bucket holding the pairs of both. Compatibility is not checked.
    pub fn merge(&self, other: &Bucket) -> Bucket {
        let mut bucket = Bucket::new();
        for (f, c) in self.pairs().chain(other.pairs()) {
            bucket.add(f.clone(), Arc::clone(c));
        }
        bucket
    }

    fn pairs(&self) -> impl Iterator<Item = (&FieldRef, &Arc<Column>)> {
        self.fields.iter().zip(self.columns.iter())
    }

    /// Selected fields: the root primary key, then every distinct field.
    pub fn projections(&self, root: &RootKey) -> Vec<FieldRef> {
        let mut out = vec![root.field()];
        for f in &self.fields {
            if !out.contains(f) {
                out.push(f.clone());
            }
        }
        out
    }

    /// Build this bucket's SELECT.
    ///
    /// Relations are merged into one join tree; when any of them can match
    /// several rows per root record the query is grouped by the primary key.
    pub fn build(&self, root: &RootKey) -> PlanResult<BucketQuery> {
        let projections = self.projections(root);
        let mut tree = JoinTree::new(&root.table);
        let mut select = Vec::with_capacity(projections.len());
        let mut bound = Vec::with_capacity(projections.len());

        for f in &projections {
            let map = tree.attach(f.relation(), !f.singular)?;
            let expr = tree.bind(&map, &f.expr())?;
            select.push(match &f.alias {
                Some(alias) => expr.clone().alias(alias),
                None => SelectExpr::new(expr.clone()),
            });
            bound.push(expr);
        }

        let primary_key = tree.bind_root(&field(NodeId::ROOT, &root.primary_key))?;
        let mut query = tree.apply(Query::new().select(select))?;
        if tree.fans_out() {
            query = query.group_by(vec![primary_key.clone()]);
        }

        Ok(BucketQuery {
            query,
            projections,
            bound,
            primary_key,
            tree,
        })
    }
}

/// A bucket's SELECT together with what it projects.
#[derive(Debug, Clone)]
pub struct BucketQuery {
    pub query: Query,
    /// Field fetched by each selected cell, in SELECT order.
    pub projections: Vec<FieldRef>,
    bound: Vec<Expr>,
    primary_key: Expr,
    tree: JoinTree,
}

impl BucketQuery {
    /// The root primary key, qualified by the root alias.
    pub fn primary_key(&self) -> &Expr {
        &self.primary_key
    }

    pub fn tree(&self) -> &JoinTree {
        &self.tree
    }

    /// Expression to sort by for a projected field.
    ///
    /// Aggregates sort by their SELECT alias, plain fields by the bound column.
    pub fn sort_expr(&self, f: &FieldRef) -> Option<Expr> {
        let idx = self.projections.iter().position(|p| p == f)?;
        match &f.alias {
            Some(alias) => Some(col(alias)),
            None => Some(self.bound[idx].clone()),
        }
    }

    /// Root-table column a plain root field was bound to.
    pub fn root_column(&self, f: &FieldRef) -> Option<Expr> {
        if !f.is_root_field() {
            return None;
        }
        self.tree.bind_root(&f.expr()).ok()
    }

    /// Restrict to the given primary keys.
    pub fn restrict_to(mut self, keys: Vec<Expr>) -> Self {
        self.query = self.query.filter(self.primary_key.clone().in_list(keys));
        self
    }
}
