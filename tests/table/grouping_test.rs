//! Grouping report rows into trees with summaries.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use common::{int, text};
use reportkit::model::{Column, ColumnKind, Value};
use reportkit::sql::SortDir;
use reportkit::table::{Aggregate, Grouping, Node, Reportable, Table};

fn sales() -> Table {
    let columns = vec![
        Arc::new(Column::new("region", ColumnKind::Generic, vec![])),
        Arc::new(Column::new("seller", ColumnKind::Generic, vec![])),
        Arc::new(Column::new("amount", ColumnKind::Integer, vec![])),
    ];
    let rows = vec![
        vec![text("north"), text("ann"), int(10)],
        vec![text("north"), text("bob"), int(5)],
        vec![text("south"), text("ann"), int(7)],
        vec![text("south"), text("ann"), Value::Null],
        vec![text("south"), text("cyd"), int(1)],
    ];
    Table::new(rows, columns).unwrap()
}

#[test]
fn test_group_sizes() {
    let groups = Grouping::new("region").group(&sales()).unwrap();
    let sizes: Vec<(String, usize)> = groups
        .iter()
        .map(|g| (g.name().to_string(), g.row_count()))
        .collect();
    assert_eq!(sizes, vec![("north".into(), 2), ("south".into(), 3)]);
    assert_eq!(groups[1].key(), &text("south"));
}

#[test]
fn test_summary_per_group() {
    let groups = Grouping::new("region")
        .aggregate(Aggregate::sum("amount"))
        .aggregate(Aggregate::count("seller"))
        .group(&sales())
        .unwrap();

    let names: Vec<&str> = groups[0].columns().iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["seller", "amount"]);
    assert_eq!(groups[0].summary().rows(), &[vec![int(2), int(15)]]);
    assert_eq!(groups[1].summary().rows(), &[vec![int(3), int(8)]]);
    assert_eq!(groups[1].summary().level(), 0);
}

#[test]
fn test_nested_sum_matches_flat_sum() {
    let flat = Aggregate::sum("amount");
    let table = sales();
    let total = table.aggregate(&flat);

    let groups = Grouping::new("region")
        .then(Grouping::new("seller"))
        .group(&table)
        .unwrap();
    let nested = flat.reduce(groups.iter().map(|g| g.aggregate(&flat)).collect());
    assert_eq!(nested, total);
    assert_eq!(total, int(23));
}

#[test]
fn test_nested_levels() {
    let groups = Grouping::new("region")
        .aggregate(Aggregate::sum("amount"))
        .then(Grouping::new("seller").aggregate(Aggregate::sum("amount")))
        .group(&sales())
        .unwrap();

    let south = &groups[1];
    assert_eq!(south.children().len(), 2);
    let Reportable::Group(ann) = &south.children()[0] else {
        panic!("expected a nested group");
    };
    assert_eq!(ann.name(), "ann");
    assert_eq!(ann.level(), 1);
    assert_eq!(ann.columns().len(), 1);
    assert_eq!(ann.summary().rows(), &[vec![int(7)]]);
    assert_eq!(south.summary().rows(), &[vec![Value::Null, int(8)]]);
}

#[test]
fn test_traverse_order() {
    let groups = Grouping::new("region")
        .then(Grouping::new("seller"))
        .group(&sales())
        .unwrap();

    let mut visited = Vec::new();
    for group in &groups {
        group.traverse(&mut |node: Node<'_>| visited.push((node.kind(), node.level())));
    }
    assert_eq!(
        &visited[..8],
        &[
            ("group", 0),
            ("group", 1),
            ("data", 2),
            ("summary", 1),
            ("group", 1),
            ("data", 2),
            ("summary", 1),
            ("summary", 0),
        ]
    );
    assert_eq!(visited.len(), 16);
}

#[test]
fn test_group_report_rows() {
    let (mut r, _) = common::report("Quote", &["company/name", "id", "description"]);
    r.set_order(&[("company/name", SortDir::Asc), ("id", SortDir::Asc)])
        .unwrap();
    let groups = r
        .group_by(
            &Grouping::new("company/name")
                .aggregate(Aggregate::count("id"))
                .aggregate(Aggregate::concat("description")),
        )
        .unwrap();

    let names: Vec<&str> = groups.iter().map(|g| g.name()).collect();
    assert_eq!(names, vec!["Audi", "BMW"]);
    assert_eq!(
        groups[1].summary().rows(),
        &[vec![int(3), text("quote 1, quote 2, quote 3")]]
    );
    assert_eq!(groups[0].summary().rows(), &[vec![int(1), text("quote 4")]]);
}

#[test]
fn test_unknown_grouping_column() {
    let (r, _) = common::report("Quote", &["id"]);
    assert!(r.group_by(&Grouping::new("company/name")).is_err());
}
