//! Expression AST for report queries.
//!
//! Expressions built by the planner refer to relation nodes
//! ([`Expr::Field`]) rather than table aliases. Aliases only exist once a
//! relation has been attached to a join tree, so [`Expr::bind`] rewrites
//! node-bound fields into alias-qualified columns right before rendering.

use std::collections::BTreeSet;

use thiserror::Error;

use super::dialect::Dialect;
use super::token::{Token, TokenStream};
use crate::relation::NodeId;

// =============================================================================
// Expression AST
// =============================================================================

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `table.column`, or a bare column.
    Column {
        table: Option<String>,
        column: String,
    },

    /// Column of a relation node, not yet bound to a table alias.
    Field { node: NodeId, column: String },

    Literal(Literal),

    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Aggregate call such as `COUNT(DISTINCT x)`.
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },

    /// Key lists of bucket queries.
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    IsNull { expr: Box<Expr>, negated: bool },

    /// `*`, only as the argument of `COUNT(*)`.
    Star { table: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
    Plus,
    Minus,
    Mul,
    Div,
}

impl BinaryOperator {
    /// Binding strength; operands with weaker operators get parenthesized.
    fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Eq
            | BinaryOperator::Ne
            | BinaryOperator::Lt
            | BinaryOperator::Gt
            | BinaryOperator::Lte
            | BinaryOperator::Gte => 3,
            BinaryOperator::Plus | BinaryOperator::Minus => 4,
            BinaryOperator::Mul | BinaryOperator::Div => 5,
        }
    }

    fn token(self) -> Token {
        match self {
            BinaryOperator::Eq => Token::Eq,
            BinaryOperator::Ne => Token::Ne,
            BinaryOperator::Lt => Token::Lt,
            BinaryOperator::Gt => Token::Gt,
            BinaryOperator::Lte => Token::Lte,
            BinaryOperator::Gte => Token::Gte,
            BinaryOperator::And => Token::And,
            BinaryOperator::Or => Token::Or,
            BinaryOperator::Plus => Token::Plus,
            BinaryOperator::Minus => Token::Minus,
            BinaryOperator::Mul => Token::Mul,
            BinaryOperator::Div => Token::Div,
        }
    }
}

/// A node-bound field whose node has no alias in the join tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("column '{column}' refers to relation node {node}, which is not part of the join tree")]
pub struct UnboundNode {
    pub node: NodeId,
    pub column: String,
}

impl Expr {
    /// Render against the default dialect.
    pub fn to_tokens(&self) -> TokenStream {
        self.to_tokens_for_dialect(Dialect::default())
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column { table, column } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Ident(column.clone()));
            }

            // Unbound fields render unqualified; single-table scopes never bind.
            Expr::Field { column, .. } => {
                ts.push(Token::Ident(column.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(match lit {
                    Literal::Int(n) => Token::LitInt(*n),
                    Literal::Float(f) => Token::LitFloat(*f),
                    Literal::String(s) => Token::LitString(s.clone()),
                    Literal::Bool(b) => Token::LitBool(*b),
                    Literal::Null => Token::LitNull,
                });
            }

            Expr::BinaryOp { left, op, right } => {
                emit_operand(&mut ts, left, *op, false, dialect);
                ts.space().push(op.token()).space();
                emit_operand(&mut ts, right, *op, true, dialect);
            }

            Expr::Function {
                name,
                args,
                distinct,
            } => {
                ts.push(Token::FunctionName(name.clone()));
                ts.lparen();
                if *distinct {
                    ts.push(Token::Distinct).space();
                }
                emit_list(&mut ts, args, dialect);
                ts.rparen();
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                // `IN ()` is not valid SQL; an empty key list matches nothing.
                if values.is_empty() {
                    ts.push(if *negated { Token::True } else { Token::False });
                } else {
                    ts.append(&expr.to_tokens_for_dialect(dialect));
                    if *negated {
                        ts.space().push(Token::Not);
                    }
                    ts.space().push(Token::In).space().lparen();
                    emit_list(&mut ts, values, dialect);
                    ts.rparen();
                }
            }

            Expr::IsNull { expr, negated } => {
                let test = if *negated { Token::IsNotNull } else { Token::IsNull };
                ts.append(&expr.to_tokens_for_dialect(dialect)).space().push(test);
            }

            Expr::Star { table } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone())).push(Token::Dot);
                }
                ts.push(Token::Star);
            }
        }

        ts
    }

    /// Rewrite every [`Expr::Field`] into a table-qualified column.
    ///
    /// `resolve` maps a relation node to the alias it received in the join
    /// tree. A node it cannot resolve is reported as [`UnboundNode`].
    pub fn bind<F>(&self, resolve: &F) -> Result<Expr, UnboundNode>
    where
        F: Fn(NodeId) -> Option<String>,
    {
        let bind_box = |e: &Expr| -> Result<Box<Expr>, UnboundNode> { Ok(Box::new(e.bind(resolve)?)) };

        Ok(match self {
            Expr::Field { node, column } => match resolve(*node) {
                Some(alias) => Expr::Column {
                    table: Some(alias),
                    column: column.clone(),
                },
                None => {
                    return Err(UnboundNode {
                        node: *node,
                        column: column.clone(),
                    })
                }
            },
            Expr::Column { .. } | Expr::Literal(_) | Expr::Star { .. } => self.clone(),
            Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
                left: bind_box(left)?,
                op: *op,
                right: bind_box(right)?,
            },
            Expr::Function {
                name,
                args,
                distinct,
            } => Expr::Function {
                name: name.clone(),
                args: args
                    .iter()
                    .map(|a| a.bind(resolve))
                    .collect::<Result<_, _>>()?,
                distinct: *distinct,
            },
            Expr::In {
                expr,
                values,
                negated,
            } => Expr::In {
                expr: bind_box(expr)?,
                values: values
                    .iter()
                    .map(|v| v.bind(resolve))
                    .collect::<Result<_, _>>()?,
                negated: *negated,
            },
            Expr::IsNull { expr, negated } => Expr::IsNull {
                expr: bind_box(expr)?,
                negated: *negated,
            },
        })
    }

    /// Relation nodes referenced by this expression.
    pub fn nodes(&self) -> BTreeSet<NodeId> {
        let mut out = BTreeSet::new();
        self.collect_nodes(&mut out);
        out
    }

    fn collect_nodes(&self, out: &mut BTreeSet<NodeId>) {
        match self {
            Expr::Field { node, .. } => {
                out.insert(*node);
            }
            Expr::Column { .. } | Expr::Literal(_) | Expr::Star { .. } => {}
            Expr::BinaryOp { left, right, .. } => {
                left.collect_nodes(out);
                right.collect_nodes(out);
            }
            Expr::IsNull { expr, .. } => expr.collect_nodes(out),
            Expr::Function { args, .. } => args.iter().for_each(|a| a.collect_nodes(out)),
            Expr::In { expr, values, .. } => {
                expr.collect_nodes(out);
                values.iter().for_each(|v| v.collect_nodes(out));
            }
        }
    }

    /// AND together a list of predicates. `None` when the list is empty.
    pub fn conjoin(predicates: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        predicates.into_iter().reduce(|acc, p| acc.and(p))
    }
}

fn emit_list(ts: &mut TokenStream, items: &[Expr], dialect: Dialect) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            ts.comma().space();
        }
        ts.append(&item.to_tokens_for_dialect(dialect));
    }
}

/// `a - (b - c)` and `a / (b / c)` keep their parentheses on the right.
fn emit_operand(ts: &mut TokenStream, operand: &Expr, parent: BinaryOperator, right: bool, dialect: Dialect) {
    let non_associative = right && matches!(parent, BinaryOperator::Minus | BinaryOperator::Div);
    let weaker = matches!(
        operand,
        Expr::BinaryOp { op, .. }
            if op.precedence() < parent.precedence()
                || (non_associative && op.precedence() == parent.precedence())
    );
    if weaker {
        ts.lparen();
    }
    ts.append(&operand.to_tokens_for_dialect(dialect));
    if weaker {
        ts.rparen();
    }
}

/// Unqualified column.
pub fn col(name: &str) -> Expr {
    Expr::Column {
        table: None,
        column: name.into(),
    }
}

/// Column of a relation node; bound to an alias by the join tree.
pub fn field(node: NodeId, column: &str) -> Expr {
    Expr::Field {
        node,
        column: column.into(),
    }
}

pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

pub fn lit_float(f: f64) -> Expr {
    Expr::Literal(Literal::Float(f))
}

pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

pub fn lit_bool(b: bool) -> Expr {
    Expr::Literal(Literal::Bool(b))
}

pub fn lit_null() -> Expr {
    Expr::Literal(Literal::Null)
}

fn aggregate(name: &str, expr: Expr, distinct: bool) -> Expr {
    Expr::Function {
        name: name.into(),
        args: vec![expr],
        distinct,
    }
}

pub fn count(expr: Expr) -> Expr {
    aggregate("COUNT", expr, false)
}

/// `COUNT(*)`
pub fn count_star() -> Expr {
    aggregate("COUNT", Expr::Star { table: None }, false)
}

pub fn count_distinct(expr: Expr) -> Expr {
    aggregate("COUNT", expr, true)
}

pub fn sum(expr: Expr) -> Expr {
    aggregate("SUM", expr, false)
}

pub fn avg(expr: Expr) -> Expr {
    aggregate("AVG", expr, false)
}

pub fn min(expr: Expr) -> Expr {
    aggregate("MIN", expr, false)
}

pub fn max(expr: Expr) -> Expr {
    aggregate("MAX", expr, false)
}

/// Values of a group joined with `,`.
pub fn group_concat(expr: Expr, distinct: bool) -> Expr {
    aggregate("GROUP_CONCAT", expr, distinct)
}

fn variadic(name: &str, first: Expr, rest: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args: std::iter::once(first).chain(rest).collect(),
        distinct: false,
    }
}

/// First non-null argument.
pub fn coalesce(first: Expr, rest: Vec<Expr>) -> Expr {
    variadic("COALESCE", first, rest)
}

pub fn concat(first: Expr, rest: Vec<Expr>) -> Expr {
    variadic("CONCAT", first, rest)
}

// =============================================================================
// Expression Builder Trait
// =============================================================================

/// Fluent predicate building on expressions and anything convertible to one.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn eq(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Eq, other.into())
    }

    fn ne(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Ne, other.into())
    }

    fn gt(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Gt, other.into())
    }

    fn gte(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Gte, other.into())
    }

    fn lt(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Lt, other.into())
    }

    fn lte(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Lte, other.into())
    }

    fn and(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::And, other.into())
    }

    fn or(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Or, other.into())
    }

    fn plus(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Plus, other.into())
    }

    fn minus(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Minus, other.into())
    }

    fn times(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Mul, other.into())
    }

    fn divided_by(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Div, other.into())
    }

    #[allow(clippy::wrong_self_convention)]
    fn is_null(self) -> Expr {
        null_test(self.into_expr(), false)
    }

    #[allow(clippy::wrong_self_convention)]
    fn is_not_null(self) -> Expr {
        null_test(self.into_expr(), true)
    }

    fn in_list(self, values: Vec<Expr>) -> Expr {
        membership(self.into_expr(), values, false)
    }

    fn not_in_list(self, values: Vec<Expr>) -> Expr {
        membership(self.into_expr(), values, true)
    }

    fn alias(self, name: &str) -> super::query::SelectExpr {
        super::query::SelectExpr::new(self.into_expr()).with_alias(name)
    }
}

fn null_test(expr: Expr, negated: bool) -> Expr {
    Expr::IsNull {
        expr: Box::new(expr),
        negated,
    }
}

fn membership(expr: Expr, values: Vec<Expr>, negated: bool) -> Expr {
    Expr::In {
        expr: Box::new(expr),
        values,
        negated,
    }
}

fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        lit_int(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        lit_int(n as i64)
    }
}

impl From<f64> for Expr {
    fn from(f: f64) -> Self {
        lit_float(f)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        lit_str(s)
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Literal(Literal::String(s))
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        lit_bool(b)
    }
}

// =============================================================================
// Tests
// =============================================================================
