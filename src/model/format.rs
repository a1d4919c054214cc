//! Display formatting options.

use serde::{Deserialize, Serialize};

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_TIME_FORMAT: &str = "%H:%M";

/// How minute durations are displayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationFormat {
    /// `HH:MM`
    #[default]
    Clock,
    /// Whole minutes.
    Minutes,
    /// Fractional hours with a decimal comma.
    Hours,
}

/// User-facing formatting options, from config or per column.
///
/// Every field is optional so column-level options can be layered over
/// report-wide defaults with [`FormatOptions::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatOptions {
    pub date_format: Option<String>,
    pub time_format: Option<String>,
    pub duration_format: Option<DurationFormat>,
    /// Decimal separator; `","` switches to a decimal comma.
    pub decimal_format: Option<String>,
    pub decimal_precision: Option<usize>,
    /// Thousands delimiter for the integer part.
    pub decimal_delimiter: Option<String>,
}

impl FormatOptions {
    /// Options in `self`, falling back to `defaults` field by field.
    pub fn merge(&self, defaults: &FormatOptions) -> FormatOptions {
        FormatOptions {
            date_format: self.date_format.clone().or_else(|| defaults.date_format.clone()),
            time_format: self.time_format.clone().or_else(|| defaults.time_format.clone()),
            duration_format: self.duration_format.or(defaults.duration_format),
            decimal_format: self.decimal_format.clone().or_else(|| defaults.decimal_format.clone()),
            decimal_precision: self.decimal_precision.or(defaults.decimal_precision),
            decimal_delimiter: self
                .decimal_delimiter
                .clone()
                .or_else(|| defaults.decimal_delimiter.clone()),
        }
    }

    /// Resolve defaults into the parameters formatting actually uses.
    pub fn params(&self) -> FormatParams {
        let date_format = self
            .date_format
            .clone()
            .unwrap_or_else(|| DEFAULT_DATE_FORMAT.into());
        let time_format = format!(
            "{} {}",
            date_format,
            self.time_format.as_deref().unwrap_or(DEFAULT_TIME_FORMAT)
        );
        FormatParams {
            date_format,
            time_format,
            duration: self.duration_format.unwrap_or_default(),
            decimal_comma: self.decimal_format.as_deref() == Some(","),
            precision: self.decimal_precision,
            delimiter: self.decimal_delimiter.clone(),
        }
    }
}

/// Formatting parameters with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatParams {
    pub date_format: String,
    /// Date and time format joined by a space.
    pub time_format: String,
    pub duration: DurationFormat,
    pub decimal_comma: bool,
    pub precision: Option<usize>,
    pub delimiter: Option<String>,
}

impl Default for FormatParams {
    fn default() -> Self {
        FormatOptions::default().params()
    }
}

/// Insert `delimiter` between every group of three digits, counting from
/// the right. A leading sign is left alone.
pub fn delimit_thousands(digits: &str, delimiter: &str) -> String {
    let (sign, body) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };
    if !body.bytes().all(|b| b.is_ascii_digit()) {
        return digits.to_string();
    }
    let mut out = String::with_capacity(digits.len() + body.len() / 3 * delimiter.len());
    out.push_str(sign);
    for (i, ch) in body.chars().enumerate() {
        if i > 0 && (body.len() - i) % 3 == 0 {
            out.push_str(delimiter);
        }
        out.push(ch);
    }
    out
}
