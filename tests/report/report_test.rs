//! Report behaviour on plain and singular-join columns of the Quote entity.

#[path = "../common/mod.rs"]
mod common;

use common::{column, int, report, rows, schema, text};
use reportkit::model::Value;
use reportkit::relation::{NodeId, Relation};
use reportkit::report::{Criterion, ReportError};
use reportkit::sql::{field, Dialect, ExprExt, SortDir};

fn ids(report: &reportkit::report::Report) -> Vec<Value> {
    column(report, "id")
}

#[test]
fn test_plain_columns() {
    let (r, log) = report("Quote", &["id", "description"]);
    assert_eq!(
        rows(&r),
        vec![
            vec![int(1), text("quote 1")],
            vec![int(2), text("quote 2")],
            vec![int(3), text("quote 3")],
            vec![int(4), text("quote 4")],
        ]
    );
    assert_eq!(r.count().unwrap(), 4);
    // No limit: the count follows from the result size.
    assert_eq!(log.query_count(), 1);
}

#[test]
fn test_limit() {
    let (mut r, _) = report("Quote", &["id"]);
    r.limit_offset(Some(1), 0).unwrap();
    assert_eq!(rows(&r), vec![vec![int(1)]]);
    assert_eq!(r.count().unwrap(), 4);
}

#[test]
fn test_limit_and_offset() {
    let (mut r, log) = report("Quote", &["id"]);
    r.limit_offset(Some(2), 1).unwrap();
    assert_eq!(rows(&r), vec![vec![int(2)], vec![int(3)]]);
    assert_eq!(r.count().unwrap(), 4);
    assert_eq!(log.query_count(), 2);
    assert!(log.statements()[0].ends_with("LIMIT 2 OFFSET 1"));
}

#[test]
fn test_short_last_page_derives_count() {
    let (mut r, log) = report("Quote", &["id"]);
    r.limit_offset(Some(3), 2).unwrap();
    assert_eq!(ids(&r), vec![int(3), int(4)]);
    assert_eq!(r.count().unwrap(), 4);
    assert_eq!(log.query_count(), 1);
}

#[test]
fn test_offset_past_end_counts_separately() {
    let (mut r, log) = report("Quote", &["id"]);
    r.limit_offset(Some(2), 10).unwrap();
    assert!(r.table().unwrap().is_empty());
    assert_eq!(r.count().unwrap(), 4);
    assert_eq!(log.query_count(), 2);
}

#[test]
fn test_offset_without_limit_is_ignored() {
    let (mut r, _) = report("Quote", &["id"]);
    r.limit_offset(None, 2).unwrap();
    assert_eq!(r.offset(), 0);
    assert_eq!(ids(&r).len(), 4);
}

#[test]
fn test_base_conditions() {
    let (mut r, log) = report("Quote", &["id"]);
    r.set_base_conditions(Criterion::predicate(field(NodeId::ROOT, "deleted_at").is_null()))
        .unwrap();
    assert_eq!(ids(&r), vec![int(1), int(2), int(4)]);
    assert_eq!(r.count().unwrap(), 3);
    assert!(log.statements()[0].contains(r#"WHERE "quotes"."deleted_at" IS NULL"#));
}

#[test]
fn test_root_filter() {
    let (mut r, _) = report("Quote", &["id"]);
    r.set_filter(Criterion::scope(
        Relation::new("quotes"),
        field(NodeId::ROOT, "contact_id").eq(4),
    ))
    .unwrap();
    assert_eq!(ids(&r), vec![int(3), int(4)]);
    assert_eq!(r.count().unwrap(), 2);
}

#[test]
fn test_filter_and_base_conditions_combine() {
    let (mut r, _) = report("Quote", &["id"]);
    r.set_filter(Criterion::scope(
        Relation::new("quotes"),
        field(NodeId::ROOT, "contact_id").eq(4),
    ))
    .unwrap();
    r.set_base_conditions(Criterion::predicate(field(NodeId::ROOT, "deleted_at").is_null()))
        .unwrap();
    assert_eq!(ids(&r), vec![int(4)]);
    assert_eq!(r.count().unwrap(), 1);
}

#[test]
fn test_filter_through_join() {
    let (mut r, log) = report("Quote", &["id"]);
    let contact = schema().relation_for("Quote", &["contact"]).unwrap();
    r.set_filter(Criterion::scope(contact, field(NodeId(1), "first_name").eq("Korneel")))
        .unwrap();
    assert_eq!(ids(&r), vec![int(3), int(4)]);
    assert_eq!(log.query_count(), 2);
    assert!(log.statements()[0].starts_with("SELECT DISTINCT"));
    assert!(log.statements()[1].contains(r#""quotes"."id" IN (3, 4)"#));

    assert_eq!(r.count().unwrap(), 2);
    assert_eq!(log.query_count(), 2);
}

#[test]
fn test_empty_join_filter_skips_main_query() {
    let (mut r, log) = report("Quote", &["id", "description"]);
    let contact = schema().relation_for("Quote", &["contact"]).unwrap();
    r.set_filter(Criterion::scope(contact, field(NodeId(1), "first_name").eq("Nobody")))
        .unwrap();
    assert!(r.table().unwrap().is_empty());
    assert!(r.table().unwrap().is_empty());
    assert_eq!(r.count().unwrap(), 0);
    assert_eq!(log.query_count(), 1);
}

#[test]
fn test_singular_join_columns() {
    let (r, log) = report("Quote", &["responsible/first_name"]);
    assert_eq!(
        column(&r, "responsible/first_name"),
        vec![text("Piet"), text("Jan"), text("Joris"), text("Korneel")]
    );
    assert_eq!(log.query_count(), 1);
}

#[test]
fn test_same_table_joined_twice() {
    let (r, log) = report("Quote", &["contact/first_name", "responsible/first_name"]);
    assert_eq!(
        column(&r, "contact/first_name"),
        vec![text("Jan"), text("Joris"), text("Korneel"), text("Korneel")]
    );
    assert_eq!(
        column(&r, "responsible/first_name"),
        vec![text("Piet"), text("Jan"), text("Joris"), text("Korneel")]
    );

    let sql = &log.statements()[0];
    assert!(sql.contains(r#"LEFT JOIN "people" ON "people"."id" = "quotes"."contact_id""#));
    assert!(sql.contains(r#"LEFT JOIN "people" AS "people_2" ON "people_2"."id" = "quotes"."responsible_id""#));
    assert!(sql.contains(r#"GROUP BY "quotes"."id""#));
}

#[test]
fn test_order_by_joined_column() {
    let (mut r, _) = report("Quote", &["id", "responsible/first_name"]);
    r.set_order(&[("responsible/first_name", SortDir::Asc)]).unwrap();
    assert_eq!(ids(&r), vec![int(2), int(3), int(4), int(1)]);

    let (mut r, _) = report("Quote", &["id", "responsible/first_name"]);
    r.set_order(&[("responsible/first_name", SortDir::Desc)]).unwrap();
    assert_eq!(ids(&r), vec![int(1), int(4), int(3), int(2)]);
}

#[test]
fn test_order_by_two_joined_columns() {
    let (mut r, _) = report("Quote", &["id", "company/name", "responsible/first_name"]);
    r.set_order(&[
        ("company/name", SortDir::Asc),
        ("responsible/first_name", SortDir::Desc),
    ])
    .unwrap();
    assert_eq!(
        rows(&r),
        vec![
            vec![int(4), text("Audi"), text("Korneel")],
            vec![int(1), text("BMW"), text("Piet")],
            vec![int(3), text("BMW"), text("Joris")],
            vec![int(2), text("BMW"), text("Jan")],
        ]
    );
}

#[test]
fn test_unknown_order_columns_are_ignored() {
    let (mut r, _) = report("Quote", &["id"]);
    r.set_order(&[("description", SortDir::Desc)]).unwrap();
    assert!(r.order().is_empty());
    assert_eq!(ids(&r), vec![int(1), int(2), int(3), int(4)]);
}

#[test]
fn test_results_are_memoized() {
    let (r, log) = report("Quote", &["id"]);
    r.count().unwrap();
    r.count().unwrap();
    assert_eq!(log.query_count(), 1);

    let (r, log) = report("Quote", &["id"]);
    r.table().unwrap();
    r.table().unwrap();
    assert_eq!(log.query_count(), 1);
    r.count().unwrap();
    assert_eq!(log.query_count(), 1);
}

#[test]
fn test_frozen_after_results() {
    let (mut r, _) = report("Quote", &["id"]);
    r.table().unwrap();
    assert!(matches!(r.set_order(&[("id", SortDir::Desc)]), Err(ReportError::Frozen)));
    assert!(matches!(r.limit_offset(Some(1), 0), Err(ReportError::Frozen)));

    let (mut r, _) = report("Quote", &["id"]);
    r.count().unwrap();
    assert!(matches!(
        r.set_base_conditions(Criterion::predicate(field(NodeId::ROOT, "id").eq(1))),
        Err(ReportError::Frozen)
    ));
}

#[test]
fn test_invalid_assignments() {
    let (mut r, _) = report("Quote", &["id"]);
    let err = r
        .set_filter(Criterion::predicate(field(NodeId::ROOT, "id").eq(1)))
        .unwrap_err();
    assert!(matches!(err, ReportError::InvalidAssignment { target: "filter", .. }));

    let people = schema().relation_for("Person", &[]).unwrap();
    let err = r.set_filter(Criterion::within(people)).unwrap_err();
    assert!(matches!(err, ReportError::InvalidAssignment { target: "filter", .. }));

    let err = r
        .set_base_conditions(Criterion::predicate(field(NodeId(1), "first_name").eq("Jan")))
        .unwrap_err();
    assert!(matches!(err, ReportError::InvalidAssignment { target: "base conditions", .. }));
}

#[test]
fn test_unknown_column() {
    let log = common::database();
    let ctx = reportkit::report::ReportContext::new(log);
    let err = reportkit::report::Report::new(
        &schema(),
        "Quote",
        &["id", "contact/shoe_size"],
        &Default::default(),
        ctx,
    )
    .unwrap_err();
    assert!(matches!(err, ReportError::UnknownColumn { ref name, .. } if name == "contact/shoe_size"));
}

#[test]
fn test_export() {
    let (mut r, _) = report("Quote", &["id", "description"]);
    r.limit_offset(Some(2), 0).unwrap();
    let ext = r.to_ext().unwrap();
    assert_eq!(ext["version"], 1);
    assert_eq!(ext["results"], 4);
    assert_eq!(ext["records"][0]["id"], 1);
    assert_eq!(ext["records"][1]["description"], "quote 2");
    assert_eq!(ext["records"].as_array().unwrap().len(), 2);
}

#[test]
fn test_plan_sql_renders_without_running() {
    let (mut r, log) = report("Quote", &["id", "description"]);
    r.set_order(&[("description", SortDir::Desc)]).unwrap();
    r.limit_offset(Some(10), 0).unwrap();
    let sql = r.plan_sql(Dialect::Sqlite).unwrap();
    assert_eq!(sql.len(), 1);
    insta::assert_snapshot!(sql[0], @r#"
    SELECT
      "quotes"."id",
      "quotes"."description"
    FROM "quotes"
    ORDER BY "quotes"."description" DESC
    LIMIT 10
    "#);
    assert_eq!(log.query_count(), 0);
}
