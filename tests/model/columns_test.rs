//! Column kinds, casting and formatting, standalone and through reports.

#[path = "../common/mod.rs"]
mod common;

use chrono::NaiveDate;
use reportkit::model::{Column, ColumnKind, DurationFormat, FormatOptions, FormatParams, Value};

fn format(kind: ColumnKind, value: &Value, options: FormatOptions) -> String {
    kind.format(value, &options.params())
}

fn timestamp(s: &str) -> Value {
    Value::Text(s.into())
}

#[test]
fn test_integer_cast() {
    assert_eq!(ColumnKind::Integer.cast(&[Value::from("12")]), Value::Int(12));
    assert_eq!(ColumnKind::Integer.cast(&[Value::Float(3.0)]), Value::Int(3));
    assert_eq!(ColumnKind::Integer.cast(&[Value::Null]), Value::Null);
}

#[test]
fn test_decimal_cast() {
    assert_eq!(ColumnKind::Decimal.cast(&[Value::Int(2)]), Value::Float(2.0));
    assert_eq!(ColumnKind::Money.cast(&[Value::from("12.5")]), Value::Float(12.5));
    assert_eq!(ColumnKind::Money.cast(&[Value::Null]), Value::Null);
}

#[test]
fn test_boolean_cast() {
    assert_eq!(ColumnKind::Boolean.cast(&[Value::Null]), Value::Bool(false));
    assert_eq!(ColumnKind::Boolean.cast(&[Value::Int(0)]), Value::Bool(false));
    assert_eq!(ColumnKind::Boolean.cast(&[Value::from("false")]), Value::Bool(false));
    assert_eq!(ColumnKind::Boolean.cast(&[Value::from("t")]), Value::Bool(true));
    assert_eq!(format(ColumnKind::Boolean, &Value::Null, FormatOptions::default()), "0");
}

#[test]
fn test_date_cast_and_format() {
    let date = ColumnKind::Date.cast(&[timestamp("2012-03-01 10:00:00")]);
    assert_eq!(date, Value::Date(NaiveDate::from_ymd_opt(2012, 3, 1).unwrap()));

    let options = FormatOptions {
        date_format: Some("%d-%m-%Y".into()),
        ..Default::default()
    };
    assert_eq!(format(ColumnKind::Date, &date, options), "01-03-2012");
    assert_eq!(format(ColumnKind::Date, &Value::Null, FormatOptions::default()), "");
}

#[test]
fn test_time_format_joins_date_and_time() {
    let ts = ColumnKind::Time.cast(&[timestamp("2012-03-01 10:05:00")]);
    assert_eq!(format(ColumnKind::Time, &ts, FormatOptions::default()), "2012-03-01 10:05");

    let options = FormatOptions {
        date_format: Some("%d/%m".into()),
        time_format: Some("%Hh%M".into()),
        ..Default::default()
    };
    assert_eq!(format(ColumnKind::Time, &ts, options), "01/03 10h05");
}

#[test]
fn test_duration_between_timestamps() {
    let secs = ColumnKind::Duration.cast(&[
        timestamp("2012-03-01 10:00:00"),
        timestamp("2012-03-01 11:30:00"),
    ]);
    assert_eq!(secs, Value::Int(5400));
    assert_eq!(format(ColumnKind::Duration, &secs, FormatOptions::default()), "01:30");
    assert_eq!(
        ColumnKind::Duration.cast(&[timestamp("2012-03-01 10:00:00"), Value::Null]),
        Value::Null
    );
}

#[test]
fn test_duration_minutes_formats() {
    let mins = ColumnKind::DurationMinutes.cast(&[Value::Int(5400)]);
    assert_eq!(mins, Value::Int(90));

    let with = |duration| FormatOptions {
        duration_format: Some(duration),
        ..Default::default()
    };
    assert_eq!(format(ColumnKind::DurationMinutes, &mins, with(DurationFormat::Clock)), "01:30");
    assert_eq!(format(ColumnKind::DurationMinutes, &mins, with(DurationFormat::Minutes)), "90");
    assert_eq!(format(ColumnKind::DurationMinutes, &mins, with(DurationFormat::Hours)), "1,5");
}

#[test]
fn test_decimal_formatting() {
    let params = FormatParams::default();
    assert_eq!(ColumnKind::Decimal.format(&Value::Float(2.5), &params), "2.5");

    let options = FormatOptions {
        decimal_format: Some(",".into()),
        decimal_precision: Some(2),
        decimal_delimiter: Some(".".into()),
        ..Default::default()
    };
    assert_eq!(format(ColumnKind::Money, &Value::Float(-1234567.891), options), "-1.234.567,89");
}

#[test]
fn test_options_merge() {
    let column = FormatOptions {
        decimal_precision: Some(0),
        ..Default::default()
    };
    let defaults = FormatOptions {
        decimal_precision: Some(2),
        decimal_delimiter: Some(" ".into()),
        ..Default::default()
    };
    let merged = column.merge(&defaults);
    assert_eq!(merged.decimal_precision, Some(0));
    assert_eq!(merged.decimal_delimiter.as_deref(), Some(" "));
}

#[test]
fn test_kind_names_round_trip_through_toml() {
    #[derive(serde::Deserialize)]
    struct Holder {
        kind: ColumnKind,
    }
    let holder: Holder = toml::from_str(r#"kind = "duration_minutes""#).unwrap();
    assert_eq!(holder.kind, ColumnKind::DurationMinutes);
}

#[test]
fn test_report_columns_are_cast() {
    let (r, _) = common::report("Company", &["name", "updated_at"]);
    let table = r.table().unwrap();
    let updated = r.column("updated_at").unwrap();
    assert_eq!(updated.kind(), ColumnKind::Time);
    assert_eq!(updated.format(&table.rows()[0][1]), "2012-03-01 10:00");
    assert_eq!(table.formatted()[2], vec!["Audi".to_string(), "2012-01-15 16:45".to_string()]);
}

#[test]
fn test_report_column_names() {
    let (r, _) = common::report("Quote", &["description", "responsible/first_name"]);
    let names: Vec<String> = r.columns().iter().map(|c| c.human_name()).collect();
    assert_eq!(names, vec!["Description", "Responsible first name"]);
}

#[test]
fn test_default_options_reach_columns() {
    let log = common::database();
    let ctx = reportkit::report::ReportContext::new(log);
    let defaults = FormatOptions {
        decimal_precision: Some(1),
        ..Default::default()
    };
    let r = reportkit::report::Report::new(&common::schema(), "Company", &["turnover"], &defaults, ctx).unwrap();
    let turnover: &Column = r.column("turnover").unwrap();
    assert_eq!(turnover.format(&Value::Float(3120000.25)), "3120000.3");
}
