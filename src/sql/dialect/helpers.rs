//! Shared helper functions for SQL dialect implementations.
//!
//! Dialects compose these to implement `SqlDialect` without repeating
//! quoting and pagination rules.

use super::super::token::{Token, TokenStream};

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: SQLite, Postgres
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with backticks.
/// Used by: MySQL
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

// =============================================================================
// Boolean Formatting
// =============================================================================

/// Format boolean as literal true/false.
/// Used by: Postgres
pub fn format_bool_literal(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Format boolean as numeric 1/0.
/// Used by: SQLite, MySQL
pub fn format_bool_numeric(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Emit LIMIT ... OFFSET ..., with a sentinel limit when only an offset is set.
///
/// SQLite and MySQL reject a bare OFFSET; `unbounded` is the literal each
/// accepts as "no limit".
pub fn emit_limit_offset_with_sentinel(
    limit: Option<u64>,
    offset: Option<u64>,
    unbounded: Token,
) -> TokenStream {
    let mut ts = TokenStream::new();

    match (limit, offset) {
        (None, None) => {}
        (Some(lim), off) => {
            ts.push(Token::Limit)
                .space()
                .push(Token::LitInt(lim as i64));
            if let Some(off) = off {
                ts.space()
                    .push(Token::Offset)
                    .space()
                    .push(Token::LitInt(off as i64));
            }
        }
        (None, Some(off)) => {
            ts.push(Token::Limit)
                .space()
                .push(unbounded)
                .space()
                .push(Token::Offset)
                .space()
                .push(Token::LitInt(off as i64));
        }
    }

    ts
}
