//! Field references: a value reachable from the root through a relation.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::relation::{NodeId, Relation};
use crate::sql::{
    avg, coalesce, concat, count, count_distinct, field, group_concat, lit_float, lit_int, lit_str, max, min,
    sum, Expr, ExprExt,
};

/// SQL aggregate applied to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFn {
    Count,
    CountDistinct,
    Sum,
    Min,
    Max,
    Avg,
    GroupConcat,
    GroupConcatDistinct,
}

impl AggregateFn {
    pub fn apply(self, expr: Expr) -> Expr {
        match self {
            AggregateFn::Count => count(expr),
            AggregateFn::CountDistinct => count_distinct(expr),
            AggregateFn::Sum => sum(expr),
            AggregateFn::Min => min(expr),
            AggregateFn::Max => max(expr),
            AggregateFn::Avg => avg(expr),
            AggregateFn::GroupConcat => group_concat(expr, false),
            AggregateFn::GroupConcatDistinct => group_concat(expr, true),
        }
    }
}

/// Argument of a [`FieldOp`]: a literal or another column of the same table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Field { field: String },
    Int(i64),
    Float(f64),
    Text(String),
}

impl Operand {
    pub fn field(name: &str) -> Self {
        Operand::Field { field: name.into() }
    }

    fn expr(&self, node: NodeId) -> Expr {
        match self {
            Operand::Field { field: name } => field(node, name),
            Operand::Int(n) => lit_int(*n),
            Operand::Float(f) => lit_float(*f),
            Operand::Text(s) => lit_str(s),
        }
    }
}

// Floats compare by bit pattern so specs stay usable as projection identities.
impl PartialEq for Operand {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Operand::Field { field: a }, Operand::Field { field: b }) => a == b,
            (Operand::Int(a), Operand::Int(b)) => a == b,
            (Operand::Float(a), Operand::Float(b)) => a.to_bits() == b.to_bits(),
            (Operand::Text(a), Operand::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Operand {}

impl Hash for Operand {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Operand::Field { field } => field.hash(state),
            Operand::Int(n) => n.hash(state),
            Operand::Float(f) => f.to_bits().hash(state),
            Operand::Text(s) => s.hash(state),
        }
    }
}

/// Row-level expression over a field, applied before any aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOp {
    Coalesce(Vec<Operand>),
    Concat(Vec<Operand>),
    Add(Operand),
    Sub(Operand),
    Mul(Operand),
    Div(Operand),
}

impl FieldOp {
    /// Apply to `base`; operand fields resolve on `node`, the field's own table.
    pub fn apply(&self, base: Expr, node: NodeId) -> Expr {
        let args = |ops: &[Operand]| ops.iter().map(|o| o.expr(node)).collect::<Vec<_>>();
        match self {
            FieldOp::Coalesce(ops) => coalesce(base, args(ops)),
            FieldOp::Concat(ops) => concat(base, args(ops)),
            FieldOp::Add(o) => base.plus(o.expr(node)),
            FieldOp::Sub(o) => base.minus(o.expr(node)),
            FieldOp::Mul(o) => base.times(o.expr(node)),
            FieldOp::Div(o) => base.divided_by(o.expr(node)),
        }
    }

    /// Columns the operation reads besides the base field.
    pub fn fields(&self) -> Vec<&str> {
        let operands: Vec<&Operand> = match self {
            FieldOp::Coalesce(ops) | FieldOp::Concat(ops) => ops.iter().collect(),
            FieldOp::Add(o) | FieldOp::Sub(o) | FieldOp::Mul(o) | FieldOp::Div(o) => vec![o],
        };
        operands
            .into_iter()
            .filter_map(|o| match o {
                Operand::Field { field } => Some(field.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// A field at the end of a relation, optionally transformed, then aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldSpec {
    pub relation: Relation,
    pub field: String,
    pub transform: Option<FieldOp>,
    pub aggregate: Option<AggregateFn>,
}

impl FieldSpec {
    pub fn new(relation: Relation, field: &str) -> Self {
        Self {
            relation,
            field: field.into(),
            transform: None,
            aggregate: None,
        }
    }

    pub fn aggregated(mut self, aggregate: AggregateFn) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    pub fn transformed(mut self, op: FieldOp) -> Self {
        self.transform = Some(op);
        self
    }

    /// Node-bound expression selecting this field.
    pub fn expr(&self) -> Expr {
        let node = self.relation.last_node();
        let mut expr = field(node, &self.field);
        if let Some(op) = &self.transform {
            expr = op.apply(expr, node);
        }
        match self.aggregate {
            Some(agg) => agg.apply(expr),
            None => expr,
        }
    }
}

/// A [`FieldSpec`] resolved for one column.
///
/// Two references are the same field when their relation, field, aggregate
/// and alias agree; that is what bucket projections deduplicate on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub spec: FieldSpec,
    /// The relation matches at most one row per root record.
    pub singular: bool,
    /// SELECT alias; set for aggregates (`<column>_<n>`).
    pub alias: Option<String>,
}

impl FieldRef {
    pub fn new(spec: FieldSpec, singular: bool) -> Self {
        Self {
            spec,
            singular,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The root primary key.
    pub fn primary_key(root: &str, primary_key: &str) -> Self {
        Self::new(FieldSpec::new(Relation::new(root), primary_key), true)
    }

    pub fn relation(&self) -> &Relation {
        &self.spec.relation
    }

    pub fn field(&self) -> &str {
        &self.spec.field
    }

    pub fn is_aggregate(&self) -> bool {
        self.spec.aggregate.is_some()
    }

    /// A plain column of the root table.
    pub fn is_root_field(&self) -> bool {
        !self.spec.relation.has_join() && !self.is_aggregate() && self.spec.transform.is_none()
    }

    pub fn expr(&self) -> Expr {
        self.spec.expr()
    }
}
