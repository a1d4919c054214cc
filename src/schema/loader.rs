//! TOML schema loading.
//!
//! ```toml
//! [entities.Company]
//! table = "companies"
//! fields = { name = "generic", turnover = "money" }
//! associations = [
//!     { name = "quotes", kind = "has_many" },
//!     { name = "relationships", kind = "has_many" },
//!     { name = "people", kind = "through", through = "relationships", source = "person" },
//! ]
//!
//! [[entities.Company.columns]]
//! name = "quote_count"
//! kind = "integer"
//! fields = [{ path = "quotes", field = "id", aggregate = "count" }]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::{AssociationKind, Entity, Schema, SchemaError, SchemaResult};

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Whether `s` is a plain SQL identifier.
pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER.is_match(s)
}

fn check_identifier(s: &str) -> SchemaResult<()> {
    if is_identifier(s) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(s.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaFile {
    #[serde(default)]
    entities: BTreeMap<String, Entity>,
}

impl Schema {
    /// Parse and validate a schema from TOML.
    pub fn from_toml_str(content: &str) -> SchemaResult<Self> {
        let file: SchemaFile = toml::from_str(content)?;
        let mut schema = Schema::new();
        for (name, mut entity) in file.entities {
            entity.name = name;
            schema.add_entity(entity);
        }
        schema.validate()?;
        debug!(entities = schema.entities.len(), "loaded schema");
        Ok(schema)
    }

    /// Load a schema file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> SchemaResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SchemaError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check identifiers, association targets and every registered column.
    pub fn validate(&self) -> SchemaResult<()> {
        for entity in self.entities.values() {
            check_identifier(&entity.name)?;
            check_identifier(&entity.table)?;
            check_identifier(&entity.primary_key)?;
            for field in entity.fields.keys() {
                check_identifier(field)?;
            }

            for assoc in &entity.associations {
                let invalid = |reason: &str| SchemaError::InvalidAssociation {
                    entity: entity.name.clone(),
                    name: assoc.name.clone(),
                    reason: reason.into(),
                };
                check_identifier(&assoc.name)?;
                if let Some(fk) = &assoc.foreign_key {
                    check_identifier(fk)?;
                }
                if let Some(poly) = &assoc.polymorphic_as {
                    check_identifier(poly)?;
                    if assoc.kind == AssociationKind::BelongsTo {
                        return Err(invalid("'as' only applies to has_one and has_many"));
                    }
                }
                match assoc.kind {
                    AssociationKind::Through => {
                        if assoc.through.is_none() {
                            return Err(invalid("missing 'through'"));
                        }
                    }
                    _ => {
                        if assoc.through.is_some() || assoc.source.is_some() {
                            return Err(invalid("'through' and 'source' need kind = \"through\""));
                        }
                        self.entity(&assoc.target_entity())?;
                    }
                }
                // Walking the association checks through/source chains end to end.
                self.relation_for(&entity.name, &[assoc.name.as_str()])?;
            }

            let mut seen = std::collections::HashSet::new();
            for column in &entity.columns {
                if !seen.insert(column.name.as_str()) {
                    return Err(SchemaError::InvalidColumn {
                        entity: entity.name.clone(),
                        column: column.name.clone(),
                        reason: "defined twice".into(),
                    });
                }
                for field in &column.fields {
                    check_identifier(&field.field)?;
                    for operand in field.transform.iter().flat_map(|op| op.fields()) {
                        check_identifier(operand)?;
                    }
                    for join in &field.joins {
                        check_identifier(&join.table)?;
                        for (joined, prev) in &join.on {
                            check_identifier(joined)?;
                            check_identifier(prev)?;
                        }
                    }
                }
                self.resolve_column(&entity.name, &column.name)?;
            }
        }
        Ok(())
    }
}
