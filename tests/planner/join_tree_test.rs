//! Join trees built from schema relations, rendered and executed.

#[path = "../common/mod.rs"]
mod common;

use reportkit::executor::QueryExecutor;
use reportkit::relation::{JoinTree, NodeId, RelationError};
use reportkit::sql::{count_distinct, field, Dialect, ExprExt, OrderByExpr, Query, SelectExpr};

#[test]
fn test_shared_prefix_is_joined_once() {
    let schema = common::schema();
    let relationships = schema.relation_for("Company", &["relationships"]).unwrap();
    let people = schema.relation_for("Company", &["people"]).unwrap();

    let mut tree = JoinTree::new("companies");
    let a = tree.attach(&relationships, true).unwrap();
    let b = tree.attach(&people, true).unwrap();
    assert_eq!(a.last(), b.get(NodeId(1)).unwrap());
    assert_eq!(tree.join_index()["relationships"].len(), 1);
    assert_eq!(tree.alias(b.last()), Some("people"));
}

#[test]
fn test_rendered_from_clause() {
    let schema = common::schema();
    let mut tree = JoinTree::new("quotes");
    let contact = tree
        .attach(&schema.relation_for("Quote", &["contact"]).unwrap(), false)
        .unwrap();
    let responsible = tree
        .attach(&schema.relation_for("Quote", &["responsible"]).unwrap(), false)
        .unwrap();

    let select = vec![
        tree.bind_root(&field(NodeId::ROOT, "id")).unwrap(),
        tree.bind(&contact, &field(NodeId(1), "first_name")).unwrap(),
        tree.bind(&responsible, &field(NodeId(1), "first_name")).unwrap(),
    ];
    let query = tree.apply(Query::new().select(select)).unwrap();
    insta::assert_snapshot!(query.to_sql(Dialect::Sqlite), @r#"
    SELECT
      "quotes"."id",
      "people"."first_name",
      "people_2"."first_name"
    FROM "quotes"
    LEFT JOIN "people" ON "people"."id" = "quotes"."contact_id"
    LEFT JOIN "people" AS "people_2" ON "people_2"."id" = "quotes"."responsible_id"
    "#);
}

#[test]
fn test_executes_against_fixture() {
    let schema = common::schema();
    let db = common::database();
    let mut tree = JoinTree::new("quotes");
    let contact = tree
        .attach(&schema.relation_for("Quote", &["contact"]).unwrap(), false)
        .unwrap();
    let responsible = tree
        .attach(&schema.relation_for("Quote", &["responsible"]).unwrap(), false)
        .unwrap();

    let id = tree.bind_root(&field(NodeId::ROOT, "id")).unwrap();
    let query = tree
        .apply(Query::new().select(vec![id.clone()]))
        .unwrap()
        .filter(
            tree.bind(&contact, &field(NodeId(1), "first_name"))
                .unwrap()
                .eq(tree.bind(&responsible, &field(NodeId(1), "first_name")).unwrap()),
        )
        .order_by(vec![OrderByExpr::asc(id)]);
    let rows = db.select_rows(&query).unwrap();
    assert_eq!(rows, vec![vec![common::int(4)]]);
}

#[test]
fn test_self_join_counts_related_companies() {
    let schema = common::schema();
    let db = common::database();
    let related = schema
        .resolve_column("Company", "related_count")
        .unwrap()
        .fields
        .remove(0);

    let mut tree = JoinTree::new("companies");
    let map = tree.attach(&related.relation, true).unwrap();
    assert!(tree.fans_out());
    assert_eq!(tree.alias(map.last()), Some("relationships_2"));

    let id = tree.bind_root(&field(NodeId::ROOT, "id")).unwrap();
    let counted = tree
        .bind(&map, &count_distinct(field(related.relation.last_node(), "company_id")))
        .unwrap();
    let query = tree
        .apply(Query::new().select(vec![SelectExpr::new(id.clone()), SelectExpr::new(counted)]))
        .unwrap()
        .group_by(vec![id.clone()])
        .order_by(vec![OrderByExpr::asc(id)]);
    let counts: Vec<_> = db
        .select_rows(&query)
        .unwrap()
        .into_iter()
        .map(|row| row[1].clone())
        .collect();
    assert_eq!(
        counts,
        vec![common::int(1), common::int(2), common::int(2), common::int(0)]
    );
}

#[test]
fn test_relation_from_other_root_rejected() {
    let schema = common::schema();
    let mut tree = JoinTree::new("quotes");
    let err = tree
        .attach(&schema.relation_for("Company", &["quotes"]).unwrap(), false)
        .unwrap_err();
    assert_eq!(
        err,
        RelationError::RootMismatch {
            expected: "quotes".into(),
            found: "companies".into()
        }
    );
}

#[test]
fn test_singularity_from_indexes() {
    let schema = common::schema();
    let db = common::database();
    let cache = reportkit::cache::IndexCache::new();
    let pk = |table: &str| schema.primary_key_for_table(table);

    let singular = |entity: &str, path: &[&str]| {
        schema
            .relation_for(entity, path)
            .unwrap()
            .is_singular(&cache, &*db, &pk)
            .unwrap()
    };
    assert!(singular("Quote", &["contact"]));
    assert!(singular("Quote", &["company"]));
    assert!(singular("Company", &["financial"]));
    assert!(!singular("Company", &["quotes"]));
    assert!(!singular("Company", &["people"]));
    assert!(singular("Company", &[]));
    assert!(cache.contains("financials"));
}
