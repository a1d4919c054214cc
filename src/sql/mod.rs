//! SQL generation module.
//!
//! This is the query IR the planner builds and the executor renders.
//! It includes:
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST, builder DSL and node binding
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

#[cfg(test)]
pub mod test_utils;

pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    avg, coalesce, col, concat, count, count_distinct, count_star, field, group_concat, lit_bool,
    lit_float, lit_int, lit_null, lit_str, max, min, sum, BinaryOperator, Expr, ExprExt, Literal,
    UnboundNode,
};
pub use query::{Join, JoinType, LimitOffset, OrderByExpr, Query, SelectExpr, SortDir, TableRef};
pub use token::{Token, TokenStream};
