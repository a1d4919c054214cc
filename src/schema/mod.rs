//! Entity registry: tables, associations and named column definitions.
//!
//! A [`Schema`] knows enough about the data model to turn a report column
//! name into field specs over relations:
//!
//! - registered columns come from [`Entity::columns`]
//! - any other name is read as a slash-delimited association path ending in
//!   a field (`responsible/first_name`)
//!
//! Schemas are usually loaded from TOML, see [`loader`].

pub mod loader;

use std::collections::BTreeMap;
use std::path::PathBuf;

use inflector::Inflector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{AggregateFn, ColumnKind, FieldOp, FieldSpec, FormatOptions};
use crate::relation::{ColumnRef, JoinOn, Relation, RelationError};
use crate::sql::JoinType;

/// Errors raised while loading or resolving a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("entity '{entity}' has no association '{name}'")]
    UnknownAssociation { entity: String, name: String },

    #[error("entity '{entity}' has no column '{name}'")]
    UnknownColumn { entity: String, name: String },

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("invalid association '{name}' on '{entity}': {reason}")]
    InvalidAssociation {
        entity: String,
        name: String,
        reason: String,
    },

    #[error("invalid column '{column}' on '{entity}': {reason}")]
    InvalidColumn {
        entity: String,
        column: String,
        reason: String,
    },

    #[error("Schema file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read schema file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse schema: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Relation(#[from] RelationError),
}

pub type SchemaResult<T> = Result<T, SchemaError>;

fn default_primary_key() -> String {
    "id".into()
}

fn default_join_kind() -> JoinType {
    JoinType::Left
}

/// How an association reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    /// `target.pk = owner.foreign_key`
    BelongsTo,
    /// `target.foreign_key = owner.pk`, at most one row when indexed uniquely.
    HasOne,
    /// `target.foreign_key = owner.pk`
    HasMany,
    /// Another association followed by a `source` association on its target.
    Through,
}

/// A named association from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Association {
    pub name: String,
    pub kind: AssociationKind,
    /// Target entity; defaults to the class-cased association name.
    #[serde(default)]
    pub target: Option<String>,
    /// Defaults to `<name>_id` (belongs_to) or `<owner>_id` (has_one, has_many).
    #[serde(default)]
    pub foreign_key: Option<String>,
    /// Polymorphic name; adds `<as>_type = '<Owner>'` to the join.
    #[serde(default, rename = "as")]
    pub polymorphic_as: Option<String>,
    /// Association on this entity a `through` association goes via.
    #[serde(default)]
    pub through: Option<String>,
    /// Association on the intermediate entity; defaults to the singular name.
    #[serde(default)]
    pub source: Option<String>,
}

impl Association {
    fn new(name: &str, kind: AssociationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            target: None,
            foreign_key: None,
            polymorphic_as: None,
            through: None,
            source: None,
        }
    }

    pub fn belongs_to(name: &str) -> Self {
        Self::new(name, AssociationKind::BelongsTo)
    }

    pub fn has_one(name: &str) -> Self {
        Self::new(name, AssociationKind::HasOne)
    }

    pub fn has_many(name: &str) -> Self {
        Self::new(name, AssociationKind::HasMany)
    }

    pub fn through(name: &str, through: &str) -> Self {
        let mut assoc = Self::new(name, AssociationKind::Through);
        assoc.through = Some(through.into());
        assoc
    }

    pub fn target(mut self, target: &str) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn foreign_key(mut self, fk: &str) -> Self {
        self.foreign_key = Some(fk.into());
        self
    }

    pub fn polymorphic_as(mut self, name: &str) -> Self {
        self.polymorphic_as = Some(name.into());
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn target_entity(&self) -> String {
        self.target
            .clone()
            .unwrap_or_else(|| self.name.to_class_case())
    }
}

/// An extra join appended after a field's association path.
///
/// `on` maps columns of the joined table to columns of the node the path
/// ended at. Used for self-joins no association describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinDef {
    pub table: String,
    #[serde(default = "default_join_kind")]
    pub kind: JoinType,
    pub on: BTreeMap<String, String>,
}

/// One field of a column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    /// Slash-delimited association path from the entity; empty for the root.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub joins: Vec<JoinDef>,
    pub field: String,
    /// Row-level expression over the field, e.g. `{ coalesce = [0] }` or `{ mul = { field = "quantity" } }`.
    #[serde(default)]
    pub transform: Option<FieldOp>,
    #[serde(default)]
    pub aggregate: Option<AggregateFn>,
}

impl FieldDef {
    pub fn new(path: &str, field: &str) -> Self {
        Self {
            path: path.into(),
            joins: vec![],
            field: field.into(),
            transform: None,
            aggregate: None,
        }
    }

    pub fn aggregate(mut self, aggregate: AggregateFn) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    pub fn transform(mut self, op: FieldOp) -> Self {
        self.transform = Some(op);
        self
    }

    pub fn join(mut self, join: JoinDef) -> Self {
        self.joins.push(join);
        self
    }
}

/// A registered report column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDefinition {
    pub name: String,
    /// Inferred from the field when omitted.
    #[serde(default)]
    pub kind: Option<ColumnKind>,
    #[serde(default)]
    pub label: Option<String>,
    /// Defaults to the root field named like the column.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub format: FormatOptions,
}

impl ColumnDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            kind: None,
            label: None,
            fields: vec![],
            format: FormatOptions::default(),
        }
    }

    pub fn kind(mut self, kind: ColumnKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
}

/// A table-backed entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Entity {
    /// Filled from the map key when loaded from TOML.
    #[serde(default)]
    pub name: String,
    pub table: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Known fields and their column kinds. When non-empty, default columns
    /// may only name these fields (or the primary key).
    #[serde(default)]
    pub fields: BTreeMap<String, ColumnKind>,
    #[serde(default)]
    pub associations: Vec<Association>,
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
}

impl Entity {
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: default_primary_key(),
            fields: BTreeMap::new(),
            associations: vec![],
            columns: vec![],
        }
    }

    pub fn field(mut self, name: &str, kind: ColumnKind) -> Self {
        self.fields.insert(name.into(), kind);
        self
    }

    pub fn association(mut self, assoc: Association) -> Self {
        self.associations.push(assoc);
        self
    }

    pub fn column(mut self, def: ColumnDefinition) -> Self {
        self.columns.push(def);
        self
    }

    pub fn find_association(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.name == name)
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn knows_field(&self, field: &str) -> bool {
        self.fields.is_empty() || field == self.primary_key || self.fields.contains_key(field)
    }
}

/// A column definition with its fields resolved into relations.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColumn {
    pub name: String,
    pub kind: ColumnKind,
    pub label: Option<String>,
    pub fields: Vec<FieldSpec>,
    pub format: FormatOptions,
}

/// The entity registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    entities: BTreeMap<String, Entity>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.add_entity(entity);
        self
    }

    pub fn add_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.name.clone(), entity);
    }

    pub fn entity(&self, name: &str) -> SchemaResult<&Entity> {
        self.entities
            .get(name)
            .ok_or_else(|| SchemaError::UnknownEntity(name.to_string()))
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_for_table(&self, table: &str) -> Option<&Entity> {
        self.entities.values().find(|e| e.table == table)
    }

    /// Primary key of a table, `id` for tables no entity maps.
    pub fn primary_key_for_table(&self, table: &str) -> String {
        self.entity_for_table(table)
            .map(|e| e.primary_key.clone())
            .unwrap_or_else(default_primary_key)
    }

    /// Relation reached by following association names from `entity`.
    pub fn relation_for(&self, entity: &str, path: &[&str]) -> SchemaResult<Relation> {
        self.walk(entity, path).map(|(rel, _)| rel)
    }

    fn walk(&self, entity: &str, path: &[&str]) -> SchemaResult<(Relation, &Entity)> {
        let mut owner = self.entity(entity)?;
        let mut rel = Relation::new(&owner.table);
        for name in path {
            let assoc = owner
                .find_association(name)
                .ok_or_else(|| SchemaError::UnknownAssociation {
                    entity: owner.name.clone(),
                    name: name.to_string(),
                })?;
            let (next_rel, next_owner) = self.hop(rel, owner, assoc)?;
            rel = next_rel;
            owner = next_owner;
        }
        Ok((rel, owner))
    }

    /// Append one association to `rel`, whose last node is `owner`.
    fn hop<'s>(
        &'s self,
        rel: Relation,
        owner: &'s Entity,
        assoc: &Association,
    ) -> SchemaResult<(Relation, &'s Entity)> {
        let from = rel.last_node();
        match assoc.kind {
            AssociationKind::BelongsTo => {
                let target = self.entity(&assoc.target_entity())?;
                let fk = assoc
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| format!("{}_id", assoc.name));
                let rel = rel.join(
                    &target.table,
                    JoinType::Left,
                    vec![JoinOn::column(&target.primary_key, ColumnRef::new(from, &fk))],
                )?;
                Ok((rel, target))
            }
            AssociationKind::HasOne | AssociationKind::HasMany => {
                let target = self.entity(&assoc.target_entity())?;
                let owner_key = ColumnRef::new(from, &owner.primary_key);
                let on = match &assoc.polymorphic_as {
                    Some(poly) => {
                        let fk = assoc
                            .foreign_key
                            .clone()
                            .unwrap_or_else(|| format!("{poly}_id"));
                        vec![
                            JoinOn::column(&fk, owner_key),
                            JoinOn::value(&format!("{poly}_type"), &owner.name),
                        ]
                    }
                    None => {
                        let fk = assoc
                            .foreign_key
                            .clone()
                            .unwrap_or_else(|| format!("{}_id", owner.name.to_snake_case()));
                        vec![JoinOn::column(&fk, owner_key)]
                    }
                };
                Ok((rel.join(&target.table, JoinType::Left, on)?, target))
            }
            AssociationKind::Through => {
                let invalid = |reason: &str| SchemaError::InvalidAssociation {
                    entity: owner.name.clone(),
                    name: assoc.name.clone(),
                    reason: reason.into(),
                };
                let via_name = assoc
                    .through
                    .as_deref()
                    .ok_or_else(|| invalid("missing 'through'"))?;
                let via = owner
                    .find_association(via_name)
                    .ok_or_else(|| invalid("'through' names no association"))?;
                if via.kind == AssociationKind::Through {
                    return Err(invalid("'through' may not be another through association"));
                }
                let (rel, middle) = self.hop(rel, owner, via)?;

                let singular = assoc.name.to_singular();
                let source = match &assoc.source {
                    Some(name) => middle.find_association(name),
                    None => middle
                        .find_association(&singular)
                        .or_else(|| middle.find_association(&assoc.name)),
                }
                .ok_or_else(|| invalid("no source association on the intermediate entity"))?;
                if source.kind == AssociationKind::Through {
                    return Err(invalid("source may not be another through association"));
                }
                self.hop(rel, middle, source)
            }
        }
    }

    /// Resolve a report column name on `entity`.
    ///
    /// Registered definitions win; otherwise the name is read as an
    /// association path ending in a field. Anything else is
    /// [`SchemaError::UnknownColumn`].
    pub fn resolve_column(&self, entity: &str, name: &str) -> SchemaResult<ResolvedColumn> {
        let owner = self.entity(entity)?;
        match owner.find_column(name) {
            Some(def) => self.resolve_definition(owner, def),
            None => self.default_column(owner, name),
        }
    }

    fn resolve_definition(&self, owner: &Entity, def: &ColumnDefinition) -> SchemaResult<ResolvedColumn> {
        let invalid = |reason: String| SchemaError::InvalidColumn {
            entity: owner.name.clone(),
            column: def.name.clone(),
            reason,
        };

        let defaults = [FieldDef::new("", &def.name)];
        let field_defs = if def.fields.is_empty() {
            &defaults[..]
        } else {
            &def.fields[..]
        };

        let mut fields = Vec::with_capacity(field_defs.len());
        let mut inferred = None;
        for fd in field_defs {
            let path: Vec<&str> = fd.path.split('/').filter(|s| !s.is_empty()).collect();
            let (mut rel, target) = self.walk(&owner.name, &path)?;
            if fd.joins.is_empty() && fd.aggregate.is_none() && fd.transform.is_none() {
                inferred = target.fields.get(&fd.field).copied();
            }
            for join in &fd.joins {
                if join.on.is_empty() {
                    return Err(invalid(format!("join on '{}' has no conditions", join.table)));
                }
                let from = rel.last_node();
                let on = join
                    .on
                    .iter()
                    .map(|(joined, prev)| JoinOn::column(joined, ColumnRef::new(from, prev)))
                    .collect();
                rel = rel.join(&join.table, join.kind, on)?;
            }
            let mut spec = FieldSpec::new(rel, &fd.field);
            spec.transform = fd.transform.clone();
            spec.aggregate = fd.aggregate;
            fields.push(spec);
        }

        let kind = match def.kind {
            Some(kind) => kind,
            None if fields.len() == 1 => inferred.unwrap_or_default(),
            None => ColumnKind::Generic,
        };
        if kind == ColumnKind::Duration && fields.len() != kind.arity() {
            return Err(invalid(format!(
                "duration columns need {} fields, got {}",
                kind.arity(),
                fields.len()
            )));
        }

        Ok(ResolvedColumn {
            name: def.name.clone(),
            kind,
            label: def.label.clone(),
            fields,
            format: def.format.clone(),
        })
    }

    fn default_column(&self, owner: &Entity, name: &str) -> SchemaResult<ResolvedColumn> {
        let unknown = || SchemaError::UnknownColumn {
            entity: owner.name.clone(),
            name: name.to_string(),
        };

        let segments: Vec<&str> = name.split('/').collect();
        let (field, path) = segments.split_last().ok_or_else(unknown)?;
        if !loader::is_identifier(field) {
            return Err(unknown());
        }
        let (rel, target) = match self.walk(&owner.name, path) {
            Ok(found) => found,
            Err(SchemaError::UnknownAssociation { .. }) => return Err(unknown()),
            Err(other) => return Err(other),
        };
        if !target.knows_field(field) {
            return Err(unknown());
        }

        Ok(ResolvedColumn {
            name: name.to_string(),
            kind: target.fields.get(*field).copied().unwrap_or_default(),
            label: None,
            fields: vec![FieldSpec::new(rel, field)],
            format: FormatOptions::default(),
        })
    }

    /// Column names offered for an entity: registered columns, then its fields.
    pub fn column_names(&self, entity: &str) -> SchemaResult<Vec<String>> {
        let owner = self.entity(entity)?;
        let mut names: Vec<String> = owner.columns.iter().map(|c| c.name.clone()).collect();
        for field in std::iter::once(&owner.primary_key).chain(owner.fields.keys()) {
            if !names.contains(field) {
                names.push(field.clone());
            }
        }
        Ok(names)
    }
}
