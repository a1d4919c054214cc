//! Report columns.

use inflector::Inflector;
use once_cell::sync::OnceCell;

use super::field::{FieldRef, FieldSpec};
use super::format::{FormatOptions, FormatParams};
use super::kind::ColumnKind;
use super::value::Value;
use super::{ModelError, ModelResult};
use crate::relation::Relation;

/// A named report field backed by one or more field references.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    fields: Vec<FieldRef>,
    label: Option<String>,
    options: FormatOptions,
    params: OnceCell<FormatParams>,
}

impl Column {
    pub fn new(name: &str, kind: ColumnKind, fields: Vec<FieldRef>) -> Self {
        Self {
            name: name.into(),
            kind,
            fields,
            label: None,
            options: FormatOptions::default(),
            params: OnceCell::new(),
        }
    }

    /// Resolve field specs into references.
    ///
    /// `singular` decides per relation whether it matches at most one row.
    /// Aggregated fields are aliased `<name>_<n>`, counting aggregates from 1.
    pub fn resolve<E>(
        name: &str,
        kind: ColumnKind,
        specs: Vec<FieldSpec>,
        mut singular: impl FnMut(&Relation) -> Result<bool, E>,
    ) -> Result<Self, E> {
        let mut aggregates = 0;
        let mut fields = Vec::with_capacity(specs.len());
        for spec in specs {
            let is_singular = singular(&spec.relation)?;
            let is_aggregate = spec.aggregate.is_some();
            let mut field = FieldRef::new(spec, is_singular);
            if is_aggregate {
                aggregates += 1;
                field = field.with_alias(&format!("{name}_{aggregates}"));
            }
            fields.push(field);
        }
        Ok(Self::new(name, kind, fields))
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_options(mut self, options: FormatOptions) -> Self {
        self.options = options;
        self.params = OnceCell::new();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn fields(&self) -> &[FieldRef] {
        &self.fields
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn options(&self) -> &FormatOptions {
        &self.options
    }

    /// Label, or the sentence-cased name.
    pub fn human_name(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => self.name.replace('/', " ").to_sentence_case(),
        }
    }

    /// Cast raw cells, one per field, into this column's value.
    pub fn value(&self, raw: &[Value]) -> Value {
        self.kind.cast(raw)
    }

    /// Pick this column's cells out of a stitched row and cast them.
    ///
    /// Cells past the end of a short row read as NULL.
    pub fn value_for_row(&self, row: &[Value], projections: &[FieldRef]) -> ModelResult<Value> {
        let mut raw = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let idx = projections
                .iter()
                .position(|p| p == field)
                .ok_or_else(|| ModelError::MissingProjection {
                    column: self.name.clone(),
                    field: field.field().to_string(),
                })?;
            raw.push(row.get(idx).cloned().unwrap_or(Value::Null));
        }
        Ok(self.value(&raw))
    }

    pub fn format(&self, value: &Value) -> String {
        let params = self.params.get_or_init(|| self.options.params());
        self.kind.format(value, params)
    }
}
