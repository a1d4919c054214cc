//! Reports: columns of one entity, filtered, ordered and paginated.
//!
//! [`Report::table`] plans the report into buckets, runs the main query
//! and stitches the extra buckets onto it. Results and the record count
//! are memoized; once either exists the report's parameters are frozen.
//!
//! # Example
//!
//! ```ignore
//! let ctx = ReportContext::new(Arc::new(SqliteExecutor::open("crm.db")?));
//! let mut report = Report::new(&schema, "Company", &["name", "quote_count"], &FormatOptions::default(), ctx)?;
//! report.set_order(&[("quote_count", SortDir::Desc)]);
//! report.limit_offset(Some(10), 0)?;
//! for row in report.table()? { /* ... */ }
//! ```

mod criterion;

pub use criterion::Criterion;

use std::fmt;
use std::sync::Arc;

use once_cell::unsync::OnceCell;
use thiserror::Error;
use tracing::debug;

use crate::cache::IndexCache;
use crate::executor::{ExecError, QueryExecutor, Row};
use crate::model::{Column, FormatOptions, ModelError, ModelResult, Value};
use crate::planner::{BucketList, BucketQuery, PlanError, RootKey};
use crate::relation::{JoinTree, NodeId, Relation, RelationError};
use crate::schema::{Schema, SchemaError};
use crate::sql::{count_distinct, field, Dialect, Expr, OrderByExpr, Query, SelectExpr, SortDir, UnboundNode};
use crate::table::{Group, Grouping, Table, TableError};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot order by {columns:?}: they are fetched by separate queries")]
    InvalidOrder { columns: Vec<String> },

    #[error("invalid {target}: {reason}")]
    InvalidAssignment { target: &'static str, reason: String },

    #[error("entity '{entity}' has no column '{name}'")]
    UnknownColumn { entity: String, name: String },

    #[error("report parameters cannot change once results are materialized")]
    Frozen,

    #[error(transparent)]
    Schema(SchemaError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Relation(#[from] RelationError),

    #[error(transparent)]
    Unbound(#[from] UnboundNode),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Table(#[from] TableError),
}

pub type ReportResult<T> = Result<T, ReportError>;

impl From<SchemaError> for ReportError {
    fn from(e: SchemaError) -> Self {
        match e {
            SchemaError::UnknownColumn { entity, name } => ReportError::UnknownColumn { entity, name },
            other => ReportError::Schema(other),
        }
    }
}

impl From<PlanError> for ReportError {
    fn from(e: PlanError) -> Self {
        match e {
            PlanError::InvalidOrder { columns } => ReportError::InvalidOrder { columns },
            PlanError::Relation(e) => ReportError::Relation(e),
            PlanError::Unbound(e) => ReportError::Unbound(e),
            PlanError::Exec(e) => ReportError::Exec(e),
        }
    }
}

/// Services a report runs against: an executor and the shared index cache.
#[derive(Clone)]
pub struct ReportContext {
    executor: Arc<dyn QueryExecutor>,
    indexes: Arc<IndexCache>,
}

impl ReportContext {
    /// A context with a fresh index cache.
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            executor,
            indexes: Arc::new(IndexCache::new()),
        }
    }

    /// Share `indexes` with other reports.
    pub fn with_indexes(mut self, indexes: Arc<IndexCache>) -> Self {
        self.indexes = indexes;
        self
    }

    pub fn executor(&self) -> &dyn QueryExecutor {
        &*self.executor
    }

    pub fn indexes(&self) -> &Arc<IndexCache> {
        &self.indexes
    }
}

impl fmt::Debug for ReportContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportContext")
            .field("dialect", &self.executor.dialect())
            .field("indexes", &self.indexes)
            .finish()
    }
}

/// The queries a report runs, before execution.
#[derive(Debug, Clone)]
pub struct Plan {
    pub buckets: BucketList,
    /// Main bucket query with conditions, ordering, pagination and grouping.
    pub main: BucketQuery,
    /// Key query for join-bearing filters; its keys restrict `main`.
    pub ids: Option<Query>,
}

enum ScopeSelect {
    Ids,
    Count,
}

#[derive(Debug)]
pub struct Report {
    ctx: ReportContext,
    entity: String,
    root: RootKey,
    columns: Vec<Arc<Column>>,
    filter: Option<(Relation, Option<Expr>)>,
    base_conditions: Option<Expr>,
    order: Vec<(Arc<Column>, SortDir)>,
    limit: Option<u64>,
    offset: u64,
    table: OnceCell<Table>,
    count: OnceCell<u64>,
}

impl Report {
    /// Resolve `columns` of `entity`.
    ///
    /// Column format options fall back to `options`. Fails on the first
    /// name that is neither registered nor a valid field path.
    pub fn new(
        schema: &Schema,
        entity: &str,
        columns: &[&str],
        options: &FormatOptions,
        ctx: ReportContext,
    ) -> ReportResult<Self> {
        let owner = schema.entity(entity)?;
        let root = RootKey::new(&owner.table, &owner.primary_key);
        let executor = ctx.executor();

        let mut resolved = Vec::with_capacity(columns.len());
        for name in columns {
            let def = schema.resolve_column(entity, name)?;
            let mut column = Column::resolve(&def.name, def.kind, def.fields, |rel| {
                rel.is_singular(&ctx.indexes, executor, |t| schema.primary_key_for_table(t))
            })?
            .with_options(def.format.merge(options));
            if let Some(label) = &def.label {
                column = column.with_label(label);
            }
            resolved.push(Arc::new(column));
        }
        debug!(entity, columns = resolved.len(), "resolved report columns");

        Ok(Self {
            entity: entity.to_string(),
            root,
            columns: resolved,
            filter: None,
            base_conditions: None,
            order: vec![],
            limit: None,
            offset: 0,
            table: OnceCell::new(),
            count: OnceCell::new(),
            ctx,
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn root(&self) -> &RootKey {
        &self.root
    }

    pub fn columns(&self) -> &[Arc<Column>] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Arc<Column>> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn order(&self) -> &[(Arc<Column>, SortDir)] {
        &self.order
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn ensure_mutable(&self) -> ReportResult<()> {
        if self.table.get().is_some() || self.count.get().is_some() {
            return Err(ReportError::Frozen);
        }
        Ok(())
    }

    /// Restrict the report to a scope, possibly through joins.
    pub fn set_filter(&mut self, filter: Criterion) -> ReportResult<()> {
        self.ensure_mutable()?;
        let invalid = |reason: String| ReportError::InvalidAssignment {
            target: "filter",
            reason,
        };
        let Criterion::Scope { relation, predicate } = filter else {
            return Err(invalid("expected a relation scope, got a bare predicate".into()));
        };
        if relation.root() != self.root.table {
            return Err(invalid(format!(
                "relation starts at '{}', report at '{}'",
                relation.root(),
                self.root.table
            )));
        }
        if let Some(node) = predicate
            .as_ref()
            .and_then(|p| criterion::foreign_node(p, relation.node_count()))
        {
            return Err(invalid(format!("predicate refers to node {node} outside '{relation}'")));
        }
        self.filter = Some((relation, predicate));
        Ok(())
    }

    /// Conditions on the root table ANDed to every query.
    pub fn set_base_conditions(&mut self, conditions: Criterion) -> ReportResult<()> {
        self.ensure_mutable()?;
        let invalid = |reason: String| ReportError::InvalidAssignment {
            target: "base conditions",
            reason,
        };
        let Criterion::Predicate(predicate) = conditions else {
            return Err(invalid(format!("expected a predicate, got a {}", conditions.kind())));
        };
        if let Some(node) = criterion::foreign_node(&predicate, 1) {
            return Err(invalid(format!("predicate refers to joined node {node}")));
        }
        self.base_conditions = Some(predicate);
        Ok(())
    }

    /// Order by report columns. Names that are not report columns are ignored.
    pub fn set_order(&mut self, orderings: &[(&str, SortDir)]) -> ReportResult<()> {
        self.ensure_mutable()?;
        self.order = orderings
            .iter()
            .filter_map(|(name, dir)| self.column(name).map(|c| (Arc::clone(c), *dir)))
            .collect();
        Ok(())
    }

    /// Paginate. Without a limit the offset is ignored.
    pub fn limit_offset(&mut self, limit: Option<u64>, offset: u64) -> ReportResult<()> {
        self.ensure_mutable()?;
        if let Some(limit) = limit {
            self.limit = Some(limit);
            self.offset = offset;
        }
        Ok(())
    }

    /// Relation and predicate every query of this report is restricted by.
    fn base(&self) -> (Relation, Option<Expr>) {
        let (relation, filter) = match &self.filter {
            Some((relation, predicate)) => (relation.clone(), predicate.clone()),
            None => (Relation::new(&self.root.table), None),
        };
        let predicate = Expr::conjoin(filter.into_iter().chain(self.base_conditions.clone()));
        (relation, predicate)
    }

    fn scope_query(&self, relation: &Relation, predicate: Option<&Expr>, select: ScopeSelect) -> ReportResult<Query> {
        let mut tree = JoinTree::new(&self.root.table);
        let map = tree.attach(relation, false)?;
        let pk = tree.bind_root(&field(NodeId::ROOT, &self.root.primary_key))?;

        let mut query = match select {
            ScopeSelect::Ids => tree.apply(Query::new().select(vec![pk]).distinct())?,
            ScopeSelect::Count => tree.apply(Query::new().select(vec![SelectExpr::new(count_distinct(pk))]))?,
        };
        if let Some(p) = predicate {
            query = query.filter(tree.bind(&map, p)?);
        }
        Ok(query)
    }

    /// Plan the report's queries without running the main query.
    pub fn plan(&self) -> ReportResult<Plan> {
        let mut buckets = BucketList::new(self.root.clone());
        buckets.bucketize(&self.columns);
        let order_columns: Vec<Arc<Column>> = self.order.iter().map(|(c, _)| Arc::clone(c)).collect();
        buckets.consolidate(&order_columns)?;

        let mut main = buckets.main_query()?;
        let (relation, predicate) = self.base();
        let ids = if relation.has_join() {
            Some(self.scope_query(&relation, predicate.as_ref(), ScopeSelect::Ids)?)
        } else {
            if let Some(p) = &predicate {
                let bound = main.tree().bind_root(p)?;
                main.query = main.query.filter(bound);
            }
            None
        };

        let mut orderings = Vec::new();
        for (column, dir) in &self.order {
            for f in column.fields() {
                if let Some(expr) = main.sort_expr(f) {
                    orderings.push(OrderByExpr::with_dir(expr, *dir));
                }
            }
        }
        if !orderings.is_empty() {
            main.query = main.query.order_by(orderings);
        }
        if let Some(limit) = self.limit {
            main.query = main.query.limit(limit);
            if self.offset > 0 {
                main.query = main.query.offset(self.offset);
            }
        }
        if main.query.has_join() {
            let attrs = self.group_attrs(&main)?;
            main.query = main.query.group_by(attrs);
        }

        Ok(Plan { buckets, main, ids })
    }

    /// GROUP BY for a main query with joins.
    ///
    /// When the ordering is on plain root fields in one direction, the
    /// shortest unique index starting with exactly those fields leads the
    /// grouping; the primary key always ends it.
    fn group_attrs(&self, main: &BucketQuery) -> ReportResult<Vec<Expr>> {
        let mut names = Vec::new();
        let mut dirs = Vec::new();
        let mut plain = true;
        for (column, dir) in &self.order {
            for f in column.fields() {
                plain &= f.is_root_field();
                names.push(f.field());
                dirs.push(*dir);
            }
        }
        let one_direction = dirs.windows(2).all(|w| w[0] == w[1]);

        let mut columns: Vec<String> = Vec::new();
        if plain && one_direction && !names.is_empty() {
            let indexes = self
                .ctx
                .indexes
                .unique_indexes(self.ctx.executor(), &self.root.table, &self.root.primary_key)?;
            let best = indexes
                .iter()
                .filter(|idx| {
                    idx.columns.len() >= names.len()
                        && idx.columns.iter().zip(&names).all(|(c, n)| c.as_str() == *n)
                })
                .min_by_key(|idx| idx.columns.len());
            if let Some(idx) = best {
                columns.extend(idx.columns.iter().cloned());
            }
        }
        if !columns.contains(&self.root.primary_key) {
            columns.push(self.root.primary_key.clone());
        }

        columns
            .into_iter()
            .map(|c| Ok(main.tree().bind_root(&field(NodeId::ROOT, &c))?))
            .collect()
    }

    /// Rendered SQL of the key query (if any), the main query and every
    /// extra bucket query, in execution order.
    pub fn plan_sql(&self, dialect: Dialect) -> ReportResult<Vec<String>> {
        let plan = self.plan()?;
        let mut out = Vec::new();
        if let Some(ids) = &plan.ids {
            out.push(ids.to_sql(dialect));
        }
        out.push(plan.main.query.to_sql(dialect));
        for bucket in plan.buckets.other_buckets() {
            out.push(bucket.build(plan.buckets.root())?.query.to_sql(dialect));
        }
        Ok(out)
    }

    /// The report's rows, computed on first call.
    pub fn table(&self) -> ReportResult<&Table> {
        self.table.get_or_try_init(|| self.build_table())
    }

    fn build_table(&self) -> ReportResult<Table> {
        let Plan { buckets, mut main, ids } = self.plan()?;
        let executor = self.ctx.executor();

        if let Some(ids) = ids {
            let keys = distinct_keys(executor.select_rows(&ids)?);
            let _ = self.count.set(keys.len() as u64);
            debug!(entity = %self.entity, count = keys.len(), "resolved filter keys");
            if keys.is_empty() {
                return Ok(Table::new(vec![], self.columns.clone())?);
            }
            main = main.restrict_to(keys);
        }

        let mut rows = executor.select_rows(&main.query)?;
        let complete = self.limit.map_or(true, |limit| (rows.len() as u64) < limit);
        let past_end = rows.is_empty() && self.offset > 0;
        if complete && !past_end && self.count.get().is_none() {
            let derived = self.offset + rows.len() as u64;
            let _ = self.count.set(derived);
            debug!(entity = %self.entity, count = derived, "derived count from result size");
        }

        let projections = buckets.execute_and_join(&mut rows, executor)?;
        let cast = rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| c.value_for_row(row, &projections))
                    .collect::<ModelResult<Vec<Value>>>()
            })
            .collect::<ModelResult<Vec<_>>>()?;
        Ok(Table::new(cast, self.columns.clone())?)
    }

    /// Number of records in scope, ignoring pagination.
    pub fn count(&self) -> ReportResult<u64> {
        self.count.get_or_try_init(|| {
            let (relation, predicate) = self.base();
            let query = self.scope_query(&relation, predicate.as_ref(), ScopeSelect::Count)?;
            Ok(self.ctx.executor().count(&query)?)
        })
        .copied()
    }

    /// `{version, results, records}` for JSON consumers.
    pub fn to_ext(&self) -> ReportResult<serde_json::Value> {
        let table = self.table()?;
        Ok(table.to_export(self.count()?))
    }

    /// Group the report's rows. Rows must already be ordered by the
    /// grouping columns.
    pub fn group_by(&self, grouping: &Grouping) -> ReportResult<Vec<Group>> {
        Ok(grouping.group(self.table()?)?)
    }
}

fn distinct_keys(rows: Vec<Row>) -> Vec<Expr> {
    let mut seen = std::collections::HashSet::new();
    rows.into_iter()
        .filter_map(|row| row.into_iter().next())
        .filter(|cell| cell.key().is_some_and(|k| seen.insert(k)))
        .map(|cell| cell.to_expr())
        .collect()
}
