//! SQLite backend.

use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::debug;

use super::{ExecResult, IndexInfo, QueryExecutor, Row};
use crate::config::{ConnectionConfig, ConnectionError, Driver};
use crate::model::Value;
use crate::sql::{Dialect, Query, SqlDialect};

/// Executor over a single SQLite connection.
pub struct SqliteExecutor {
    conn: Connection,
}

impl SqliteExecutor {
    pub fn open(path: impl AsRef<Path>) -> ExecResult<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> ExecResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Open the database a connection config points at.
    pub fn connect(config: &ConnectionConfig) -> ExecResult<Self> {
        if config.driver != Driver::Sqlite {
            return Err(ConnectionError::UnsupportedDriver(config.driver.to_string()).into());
        }
        if config.is_in_memory() {
            Self::open_in_memory()
        } else {
            Self::open(&config.target)
        }
    }

    /// Run raw statements (schema setup, fixtures).
    pub fn execute_batch(&self, sql: &str) -> ExecResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn pragma_rows<T>(
        &self,
        sql: &str,
        map: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> ExecResult<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], map)?.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn to_value(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(s) | ValueRef::Blob(s) => Value::Text(String::from_utf8_lossy(s).into_owned()),
    }
}

impl QueryExecutor for SqliteExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn select_rows(&self, query: &Query) -> ExecResult<Vec<Row>> {
        let sql = query.to_sql(Dialect::Sqlite);
        debug!(sql = %sql, "executing query");

        let mut stmt = self.conn.prepare(&sql)?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(to_value))
                    .collect::<rusqlite::Result<Row>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(rows = rows.len(), "query returned");
        Ok(rows)
    }

    fn indexes(&self, table: &str) -> ExecResult<Vec<IndexInfo>> {
        let quoted = Dialect::Sqlite.quote_identifier(table);

        // (name, unique, origin)
        let listed = self.pragma_rows(&format!("PRAGMA index_list({quoted})"), |row| {
            Ok((
                row.get::<_, String>("name")?,
                row.get::<_, bool>("unique")?,
                row.get::<_, String>("origin")?,
            ))
        })?;

        let mut indexes = Vec::with_capacity(listed.len() + 1);

        // INTEGER PRIMARY KEY columns are rowid aliases and never show up in index_list.
        let mut pk: Vec<(i64, String)> = self
            .pragma_rows(&format!("PRAGMA table_info({quoted})"), |row| {
                Ok((row.get::<_, i64>("pk")?, row.get::<_, String>("name")?))
            })?
            .into_iter()
            .filter(|(pos, _)| *pos > 0)
            .collect();
        pk.sort();
        if !pk.is_empty() && !listed.iter().any(|(_, _, origin)| origin == "pk") {
            indexes.push(IndexInfo {
                name: crate::cache::PRIMARY_INDEX.into(),
                columns: pk.into_iter().map(|(_, name)| name).collect(),
                unique: true,
            });
        }

        for (name, unique, _) in listed {
            let quoted_index = Dialect::Sqlite.quote_identifier(&name);
            let mut columns: Vec<(i64, Option<String>)> =
                self.pragma_rows(&format!("PRAGMA index_info({quoted_index})"), |row| {
                    Ok((row.get::<_, i64>("seqno")?, row.get::<_, Option<String>>("name")?))
                })?;
            columns.sort();
            // Expression indexes have unnamed columns and never match a field list.
            if columns.iter().any(|(_, c)| c.is_none()) {
                continue;
            }
            indexes.push(IndexInfo {
                name,
                columns: columns.into_iter().filter_map(|(_, c)| c).collect(),
                unique,
            });
        }

        debug!(table, count = indexes.len(), "read indexes");
        Ok(indexes)
    }
}
