//! Column kinds: how raw cells are cast and displayed.

use std::fmt::Write;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::format::{delimit_thousands, DurationFormat, FormatParams};
use super::value::Value;

/// The closed set of column behaviours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Passes values through unchanged.
    #[default]
    Generic,
    Integer,
    Decimal,
    Money,
    Boolean,
    Date,
    Time,
    /// Seconds between two timestamps (start, stop).
    Duration,
    /// Minutes from a number of seconds.
    DurationMinutes,
}

impl ColumnKind {
    /// Number of fields the cast consumes.
    pub fn arity(self) -> usize {
        match self {
            ColumnKind::Duration => 2,
            _ => 1,
        }
    }

    /// Cast raw cells (one per field, in field order) into one value.
    pub fn cast(self, raw: &[Value]) -> Value {
        let first = raw.first().unwrap_or(&Value::Null);
        match self {
            ColumnKind::Generic => first.clone(),
            ColumnKind::Integer => first.as_i64().map_or(Value::Null, Value::Int),
            ColumnKind::Decimal | ColumnKind::Money => first.as_f64().map_or(Value::Null, Value::Float),
            ColumnKind::Boolean => Value::Bool(cast_bool(first)),
            ColumnKind::Date => match first {
                Value::Date(_) | Value::Null => first.clone(),
                other => to_timestamp(other)
                    .map(|ts| Value::Date(ts.date()))
                    .or_else(|| other.as_str().and_then(parse_date).map(Value::Date))
                    .unwrap_or_else(|| other.clone()),
            },
            ColumnKind::Time => match first {
                Value::Null => Value::Null,
                other => to_timestamp(other).map_or_else(|| other.clone(), Value::Timestamp),
            },
            ColumnKind::Duration => {
                let stop = raw.get(1).unwrap_or(&Value::Null);
                duration_seconds(first, stop)
            }
            ColumnKind::DurationMinutes => Value::Int(first.as_i64().unwrap_or(0) / 60),
        }
    }

    /// Render a cast value for display.
    pub fn format(self, value: &Value, params: &FormatParams) -> String {
        match self {
            ColumnKind::Boolean => String::from(if cast_bool(value) { "1" } else { "0" }),
            _ if value.is_null() => String::new(),
            ColumnKind::Generic | ColumnKind::Integer => value.to_string(),
            ColumnKind::Date => match value {
                Value::Date(d) => strftime_date(*d, &params.date_format),
                Value::Timestamp(ts) => strftime_date(ts.date(), &params.date_format),
                other => other.to_string(),
            },
            ColumnKind::Time => match value {
                Value::Timestamp(ts) => strftime(*ts, &params.time_format),
                Value::Date(d) => strftime(d.and_time(NaiveTime::MIN), &params.time_format),
                other => other.to_string(),
            },
            ColumnKind::Duration => match value.as_i64() {
                Some(secs) => format!("{:02}:{:02}", secs.div_euclid(3600), secs.rem_euclid(3600) / 60),
                None => value.to_string(),
            },
            ColumnKind::DurationMinutes => match value.as_i64() {
                Some(mins) => match params.duration {
                    DurationFormat::Minutes => mins.to_string(),
                    DurationFormat::Hours => {
                        let hours = Value::Float(mins as f64 / 60.0);
                        hours.to_string().replacen('.', ",", 1)
                    }
                    DurationFormat::Clock => format!("{:02}:{:02}", mins.div_euclid(60), mins.rem_euclid(60)),
                },
                None => value.to_string(),
            },
            ColumnKind::Decimal | ColumnKind::Money => format_decimal(value, params),
        }
    }
}

/// Booleans from typeless SQL results: NULL, 0 and `"false"`/`"0"` are false,
/// anything else is true.
fn cast_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Text(s) => !matches!(s.trim().to_lowercase().as_str(), "false" | "0"),
        Value::Date(_) | Value::Timestamp(_) => true,
    }
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

fn to_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Timestamp(ts) => Some(*ts),
        Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
        Value::Int(secs) => DateTime::from_timestamp(*secs, 0).map(|dt| dt.naive_utc()),
        Value::Text(s) => parse_timestamp(s),
        _ => None,
    }
}

fn duration_seconds(start: &Value, stop: &Value) -> Value {
    match (start, stop) {
        (Value::Null, _) | (_, Value::Null) => Value::Null,
        (Value::Int(a), Value::Int(b)) => Value::Int(b - a),
        (Value::Float(_), _) | (_, Value::Float(_)) => match (start.as_f64(), stop.as_f64()) {
            (Some(a), Some(b)) => Value::Float(b - a),
            _ => Value::Null,
        },
        _ => match (to_timestamp(start), to_timestamp(stop)) {
            (Some(a), Some(b)) => Value::Int((b - a).num_seconds()),
            _ => Value::Null,
        },
    }
}

// chrono reports unknown specifiers as a fmt::Error, so write instead of to_string.
fn strftime(ts: NaiveDateTime, pattern: &str) -> String {
    let mut out = String::new();
    match write!(out, "{}", ts.format(pattern)) {
        Ok(()) => out,
        Err(_) => ts.to_string(),
    }
}

fn strftime_date(date: NaiveDate, pattern: &str) -> String {
    let mut out = String::new();
    match write!(out, "{}", date.format(pattern)) {
        Ok(()) => out,
        Err(_) => date.to_string(),
    }
}

fn format_decimal(value: &Value, params: &FormatParams) -> String {
    let rendered = match (params.precision, value) {
        (Some(precision), _) => match value.as_f64() {
            Some(number) => {
                let scale = 10f64.powi(precision as i32);
                format!("{:.*}", precision, (number * scale).round() / scale)
            }
            None => return value.to_string(),
        },
        (None, Value::Int(_) | Value::Float(_)) => value.to_string(),
        (None, other) => match other.as_f64() {
            Some(number) => Value::Float(number).to_string(),
            None => return other.to_string(),
        },
    };

    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f)),
        None => (rendered.clone(), None),
    };
    let int_part = match &params.delimiter {
        Some(delimiter) => delimit_thousands(&int_part, delimiter),
        None => int_part,
    };
    match frac_part {
        Some(frac) => {
            let separator = if params.decimal_comma { ',' } else { '.' };
            format!("{int_part}{separator}{frac}")
        }
        None => int_part,
    }
}
