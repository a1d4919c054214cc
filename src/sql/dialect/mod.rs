//! Per-database spelling of report queries.
//!
//! Report queries only differ between databases in identifier quoting,
//! boolean literals and how an offset without a limit is written.
//! [`Dialect`] picks one of the [`SqlDialect`] implementations.
//!
//! ```
//! use reportkit::sql::dialect::{Dialect, SqlDialect};
//!
//! assert_eq!(Dialect::MySql.quote_identifier("people"), "`people`");
//! ```

pub mod helpers;
mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySql;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use serde::{Deserialize, Serialize};

use super::token::{Token, TokenStream};

/// How a dialect spells the parts of a report query that differ between
/// databases. Defaults follow ANSI.
pub trait SqlDialect: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn quote_identifier(&self, ident: &str) -> String;

    fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    fn format_bool(&self, b: bool) -> &'static str;

    /// `LIMIT n OFFSET m`, either part optional.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        let clauses = [(Token::Limit, limit), (Token::Offset, offset)];
        let mut ts = TokenStream::new();
        for (keyword, n) in clauses.into_iter().filter_map(|(k, n)| Some((k, n?))) {
            if !ts.is_empty() {
                ts.space();
            }
            ts.push(keyword).space().push(Token::LitInt(n as i64));
        }
        ts
    }
}

/// Dialects a report can be rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgres,
    MySql,
}

impl Dialect {
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Sqlite => &Sqlite,
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
        }
    }
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dialect = match s.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Dialect::Sqlite,
            "postgres" | "postgresql" | "pg" => Dialect::Postgres,
            "mysql" | "mariadb" => Dialect::MySql,
            other => return Err(format!("unknown dialect '{other}'")),
        };
        Ok(dialect)
    }
}
