//! Bucketing, consolidation and stitching over the fixture database.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use common::int;
use reportkit::executor::{QueryExecutor, Row};
use reportkit::model::{Column, Value};
use reportkit::planner::{BucketList, PlanError, RootKey};

fn columns(entity: &str, names: &[&str]) -> Vec<Arc<Column>> {
    let (report, _) = common::report(entity, names);
    report.columns().to_vec()
}

fn companies() -> RootKey {
    RootKey::new("companies", "id")
}

#[test]
fn test_one_bucket_per_fan_out_path() {
    let cols = columns(
        "Company",
        &["name", "financial/vat_no", "people_count", "people_sum", "quote_count", "related_count"],
    );
    let mut list = BucketList::new(companies());
    list.bucketize(&cols);

    assert_eq!(list.len(), 4);
    assert!(list.main().includes(&cols[0]));
    assert!(list.main().includes(&cols[1]));
    assert!(list.main().is_singular());
    assert!(list.buckets()[1].includes(&cols[2]));
    assert!(list.buckets()[1].includes(&cols[3]));
    assert!(list.buckets()[2].includes(&cols[4]));
    assert!(list.buckets()[3].includes(&cols[5]));
}

#[test]
fn test_consolidate_follows_order() {
    let cols = columns("Company", &["name", "people_count", "quote_count"]);

    let mut list = BucketList::new(companies());
    list.bucketize(&cols);
    list.consolidate(&[]).unwrap();
    assert_eq!(list.len(), 2);
    assert!(list.main().includes(&cols[1]));

    let mut list = BucketList::new(companies());
    list.bucketize(&cols);
    list.consolidate(&[Arc::clone(&cols[0]), Arc::clone(&cols[2])]).unwrap();
    assert!(list.main().includes(&cols[2]));
    assert!(list.other_buckets()[0].includes(&cols[1]));

    let mut list = BucketList::new(companies());
    list.bucketize(&cols);
    let err = list
        .consolidate(&[Arc::clone(&cols[1]), Arc::clone(&cols[2])])
        .unwrap_err();
    assert!(matches!(err, PlanError::InvalidOrder { .. }));
}

#[test]
fn test_main_query_projects_primary_key_first() {
    let cols = columns("Company", &["name", "people_count"]);
    let mut list = BucketList::new(companies());
    list.bucketize(&cols);
    list.consolidate(&[]).unwrap();

    let main = list.main_query().unwrap();
    assert_eq!(main.projections[0], companies().field());
    assert_eq!(main.projections.len(), 3);
    insta::assert_snapshot!(main.query.to_sql(reportkit::sql::Dialect::Sqlite), @r#"
    SELECT
      "companies"."id",
      "companies"."name",
      COUNT("people"."id") AS "people_count_1"
    FROM "companies"
    LEFT JOIN "relationships" ON "relationships"."company_id" = "companies"."id"
    LEFT JOIN "people" ON "people"."id" = "relationships"."person_id"
    GROUP BY "companies"."id"
    "#);
}

#[test]
fn test_stitching_against_database() {
    let db = common::database();
    let cols = columns("Company", &["name", "people_count", "quote_count", "related_count"]);
    let mut list = BucketList::new(companies());
    list.bucketize(&cols);
    list.consolidate(&[]).unwrap();
    assert_eq!(list.len(), 3);

    let main = list.main_query().unwrap();
    let mut rows = db.select_rows(&main.query).unwrap();
    assert_eq!(rows[0].len(), 3);

    let projections = list.execute_and_join(&mut rows, &*db).unwrap();
    // Every bucket leads with the primary key.
    assert_eq!(projections.len(), 7);
    assert_eq!(db.query_count(), 3);

    let quote_count = projections
        .iter()
        .position(|p| p.alias.as_deref() == Some("quote_count_1"))
        .unwrap();
    let related = projections
        .iter()
        .position(|p| p.alias.as_deref() == Some("related_count_1"))
        .unwrap();
    let cells: Vec<(Value, Value)> = rows
        .iter()
        .map(|row| (row[quote_count].clone(), row[related].clone()))
        .collect();
    assert_eq!(
        cells,
        vec![(int(3), int(1)), (int(0), int(2)), (int(1), int(2)), (int(0), int(0))]
    );
}

#[test]
fn test_no_rows_no_extra_queries() {
    let db = common::database();
    let cols = columns("Company", &["name", "people_count", "quote_count"]);
    let mut list = BucketList::new(companies());
    list.bucketize(&cols);
    list.consolidate(&[]).unwrap();

    let mut rows: Vec<Row> = vec![];
    list.execute_and_join(&mut rows, &*db).unwrap();
    assert_eq!(db.query_count(), 0);
}
