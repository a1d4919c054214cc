//! SELECT builder used for key, main and bucket queries.
//!
//! Only the clauses the planner emits exist here. Rendering goes through
//! [`TokenStream`] so every dialect shares one layout: one select item per
//! line, each clause on its own line.

use serde::{Deserialize, Serialize};

use super::dialect::{Dialect, SqlDialect};
use super::expr::{Expr, ExprExt};
use super::token::{Token, TokenStream};

/// Push ` AS "alias"` when an alias is present.
fn push_alias(ts: &mut TokenStream, alias: Option<&str>) {
    if let Some(alias) = alias {
        ts.space().push(Token::As).space().push(Token::Ident(alias.to_string()));
    }
}

/// Push `items` separated by `, `.
fn push_list<'a, T: 'a>(
    ts: &mut TokenStream,
    items: impl IntoIterator<Item = &'a T>,
    render: impl Fn(&T) -> TokenStream,
) {
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            ts.comma().space();
        }
        ts.append(&render(item));
    }
}

/// One projected expression, optionally aliased.
///
/// Bucket queries alias their aggregates so stitched result columns stay
/// identifiable.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(self, alias: &str) -> Self {
        Self {
            alias: Some(alias.to_string()),
            ..self
        }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);
        push_alias(&mut ts, self.alias.as_deref());
        ts
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

/// A table in FROM or JOIN position.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct TableRef {
    pub table: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            alias: None,
        }
    }

    /// Alias the table. An alias equal to the table name is dropped.
    pub fn with_alias(self, alias: &str) -> Self {
        let alias = (alias != self.table).then(|| alias.to_string());
        Self { alias, ..self }
    }

    /// Name the rest of the query uses to refer to this table.
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Ident(self.table.clone()));
        push_alias(&mut ts, self.alias.as_deref());
        ts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    Inner,
    Left,
}

impl JoinType {
    fn token(self) -> Token {
        match self {
            JoinType::Inner => Token::Inner,
            JoinType::Left => Token::Left,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: Expr,
}

impl Join {
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(self.join_type.token()).space().push(Token::Join).space();
        ts.append(&self.table.to_tokens());
        ts.space().push(Token::On).space();
        ts.append(&self.on.to_tokens_for_dialect(dialect));
        ts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    fn token(self) -> Token {
        match self {
            SortDir::Asc => Token::Asc,
            SortDir::Desc => Token::Desc,
        }
    }
}

impl std::str::FromStr for SortDir {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDir::Asc),
            "desc" | "descending" => Ok(SortDir::Desc),
            other => Err(format!("unknown sort direction '{other}'")),
        }
    }
}

/// An ordering term. The direction is always rendered.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: SortDir,
}

impl OrderByExpr {
    pub fn asc(expr: Expr) -> Self {
        Self::with_dir(expr, SortDir::Asc)
    }

    pub fn desc(expr: Expr) -> Self {
        Self::with_dir(expr, SortDir::Desc)
    }

    pub fn with_dir(expr: Expr, dir: SortDir) -> Self {
        Self { expr, dir }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);
        ts.space().push(self.dir.token());
        ts
    }
}

/// Pagination. How it renders is up to the dialect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitOffset {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl LimitOffset {
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        dialect.emit_limit_offset(self.limit, self.offset)
    }
}

/// A SELECT statement.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Query has no effect until converted to SQL with to_sql() or to_tokens()"]
pub struct Query {
    pub select: Vec<SelectExpr>,
    pub distinct: bool,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit_offset: Option<LimitOffset>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the projection list.
    pub fn select(self, exprs: Vec<impl Into<SelectExpr>>) -> Self {
        Self {
            select: exprs.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    pub fn distinct(self) -> Self {
        Self { distinct: true, ..self }
    }

    pub fn from(self, table: TableRef) -> Self {
        Self {
            from: Some(table),
            ..self
        }
    }

    pub fn join(mut self, join_type: JoinType, table: TableRef, on: Expr) -> Self {
        self.joins.push(Join { join_type, table, on });
        self
    }

    /// AND `condition` onto the WHERE clause.
    pub fn filter(self, condition: Expr) -> Self {
        let where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        Self { where_clause, ..self }
    }

    pub fn group_by(self, exprs: Vec<Expr>) -> Self {
        Self { group_by: exprs, ..self }
    }

    pub fn order_by(self, exprs: Vec<OrderByExpr>) -> Self {
        Self { order_by: exprs, ..self }
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit_offset.get_or_insert_with(LimitOffset::default).limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.limit_offset.get_or_insert_with(LimitOffset::default).offset = Some(offset);
        self
    }

    pub fn has_join(&self) -> bool {
        !self.joins.is_empty()
    }

    pub fn to_tokens(&self) -> TokenStream {
        self.to_tokens_for_dialect(Dialect::default())
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Select);
        if self.distinct {
            ts.space().push(Token::Distinct);
        }
        for (i, item) in self.select.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            ts.newline().indent(1).append(&item.to_tokens_for_dialect(dialect));
        }

        if let Some(from) = &self.from {
            ts.newline().push(Token::From).space().append(&from.to_tokens());
        }
        for join in &self.joins {
            ts.newline().append(&join.to_tokens_for_dialect(dialect));
        }
        if let Some(condition) = &self.where_clause {
            ts.newline().push(Token::Where).space();
            ts.append(&condition.to_tokens_for_dialect(dialect));
        }
        if !self.group_by.is_empty() {
            ts.newline().push(Token::GroupBy).space();
            push_list(&mut ts, &self.group_by, |e| e.to_tokens_for_dialect(dialect));
        }
        if !self.order_by.is_empty() {
            ts.newline().push(Token::OrderBy).space();
            push_list(&mut ts, &self.order_by, |o| o.to_tokens_for_dialect(dialect));
        }

        let pagination = self
            .limit_offset
            .as_ref()
            .map(|lo| lo.to_tokens(dialect))
            .filter(|clause| !clause.is_empty());
        if let Some(clause) = pagination {
            ts.newline().append(&clause);
        }
        ts
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

/// Renders as SQLite.
impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_sql(Dialect::default()))
    }
}
