//! Schema loading, validation and column resolution.

#[path = "../common/mod.rs"]
mod common;

use reportkit::model::{AggregateFn, ColumnKind};
use reportkit::relation::{ColumnRef, JoinOn, NodeId, Relation};
use reportkit::schema::{Schema, SchemaError};
use reportkit::sql::JoinType;

#[test]
fn test_fixture_schema_loads() {
    let schema = common::schema();
    let names: Vec<&str> = schema.entities().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Company", "Financial", "Person", "Quote", "Relationship"]);
    assert_eq!(schema.entity_for_table("quotes").unwrap().name, "Quote");
    assert_eq!(schema.primary_key_for_table("unmapped"), "id");
}

#[test]
fn test_belongs_to_with_target() {
    let rel = common::schema().relation_for("Quote", &["responsible"]).unwrap();
    let expected = Relation::new("quotes")
        .left_join("people", "id", ColumnRef::root("responsible_id"))
        .unwrap();
    assert_eq!(rel, expected);
}

#[test]
fn test_through_in_both_directions() {
    let schema = common::schema();
    let people = schema.relation_for("Company", &["people"]).unwrap();
    assert_eq!(people.to_string(), "companies -> relationships -> people");

    let companies = schema.relation_for("Person", &["companies"]).unwrap();
    assert_eq!(companies.to_string(), "people -> relationships -> companies");
    assert_eq!(
        companies.steps()[1].on,
        vec![JoinOn::column("id", ColumnRef::new(NodeId(1), "company_id"))]
    );
}

#[test]
fn test_path_through_several_associations() {
    let rel = common::schema()
        .relation_for("Quote", &["company", "people"])
        .unwrap();
    assert_eq!(rel.to_string(), "quotes -> companies -> relationships -> people");
    assert_eq!(rel.last_node(), NodeId(3));
}

#[test]
fn test_registered_column_with_extra_join() {
    let col = common::schema().resolve_column("Company", "related_count").unwrap();
    assert_eq!(col.kind, ColumnKind::Integer);
    let spec = &col.fields[0];
    assert_eq!(spec.aggregate, Some(AggregateFn::CountDistinct));
    assert_eq!(spec.field, "company_id");
    assert_eq!(spec.relation.to_string(), "companies -> relationships -> relationships");
    assert_eq!(
        spec.relation.steps()[1].on,
        vec![JoinOn::column("person_id", ColumnRef::new(NodeId(1), "person_id"))]
    );
    assert_eq!(spec.relation.steps()[1].kind, JoinType::Left);
}

#[test]
fn test_default_columns() {
    let schema = common::schema();
    let col = schema.resolve_column("Quote", "contact/first_name").unwrap();
    assert_eq!(col.kind, ColumnKind::Generic);
    assert!(col.label.is_none());
    assert_eq!(col.fields[0].relation.last_table(), "people");

    let col = schema.resolve_column("Quote", "deleted_at").unwrap();
    assert_eq!(col.kind, ColumnKind::Time);

    assert!(matches!(
        schema.resolve_column("Quote", "contact/shoe_size"),
        Err(SchemaError::UnknownColumn { .. })
    ));
    assert!(matches!(
        schema.resolve_column("Quote", "supplier/name"),
        Err(SchemaError::UnknownColumn { .. })
    ));
}

#[test]
fn test_column_names() {
    let names = common::schema().column_names("Company").unwrap();
    assert_eq!(
        names,
        vec![
            "people_count",
            "people_sum",
            "quote_count",
            "related_count",
            "people_names",
            "turnover_or_zero",
            "doubled_turnover",
            "id",
            "alpha",
            "name",
            "turnover",
            "updated_at",
        ]
    );
}

#[test]
fn test_through_without_source_rejected() {
    let err = Schema::from_toml_str(
        r#"
[entities.Company]
table = "companies"
associations = [
    { name = "relationships", kind = "has_many" },
    { name = "people", kind = "through", through = "relationships" },
]

[entities.Relationship]
table = "relationships"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidAssociation { ref name, .. } if name == "people"));
}

#[test]
fn test_polymorphic_belongs_to_rejected() {
    let err = Schema::from_toml_str(
        r#"
[entities.Financial]
table = "financials"
associations = [{ name = "company", kind = "belongs_to", as = "financiable" }]

[entities.Company]
table = "companies"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidAssociation { .. }));
}

#[test]
fn test_duplicate_column_rejected() {
    let err = Schema::from_toml_str(
        r#"
[entities.Company]
table = "companies"

[[entities.Company.columns]]
name = "name"

[[entities.Company.columns]]
name = "name"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidColumn { ref reason, .. } if reason == "defined twice"));
}

#[test]
fn test_join_without_conditions_rejected() {
    let err = Schema::from_toml_str(
        r#"
[entities.Company]
table = "companies"

[[entities.Company.columns]]
name = "twins"
fields = [{ joins = [{ table = "companies", on = {} }], field = "id" }]
"#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidColumn { ref column, .. } if column == "twins"));
}

#[test]
fn test_unknown_aggregate_rejected() {
    let err = Schema::from_toml_str(
        r#"
[entities.Company]
table = "companies"

[[entities.Company.columns]]
name = "median_id"
fields = [{ field = "id", aggregate = "median" }]
"#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::Parse(_)));
}
