//! Database connection configuration.
//!
//! Supports configuration via environment variables:
//! - `REPORTKIT_DB_DRIVER`: Database driver (sqlite, postgres, mysql)
//! - `REPORTKIT_DB_PATH`: Database file (SQLite) or connection URL

use std::env;
use std::fmt;

use crate::sql::Dialect;

/// Error type for connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unsupported driver: {0}. Supported: sqlite")]
    UnsupportedDriver(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Supported database drivers.
///
/// Every driver renders SQL in its own dialect; only SQLite has an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Sqlite,
    Postgres,
    MySql,
}

impl Driver {
    /// Parse driver from string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConnectionError> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Driver::Postgres),
            "mysql" | "mariadb" => Ok(Driver::MySql),
            other => Err(ConnectionError::UnsupportedDriver(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Sqlite => "sqlite",
            Driver::Postgres => "postgres",
            Driver::MySql => "mysql",
        }
    }

    /// SQL dialect queries for this driver are rendered in.
    pub fn dialect(&self) -> Dialect {
        match self {
            Driver::Sqlite => Dialect::Sqlite,
            Driver::Postgres => Dialect::Postgres,
            Driver::MySql => Dialect::MySql,
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub driver: Driver,
    /// File path (SQLite) or connection URL.
    pub target: String,
}

impl ConnectionConfig {
    /// SQLite database file, or `:memory:`.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            driver: Driver::Sqlite,
            target: path.into(),
        }
    }

    /// Parse a driver name and connection string.
    ///
    /// A `sqlite://` prefix is stripped from SQLite targets.
    pub fn parse(driver: &str, connection_string: &str) -> Result<Self, ConnectionError> {
        let driver = Driver::from_str(driver)?;
        let target = match driver {
            Driver::Sqlite => connection_string
                .strip_prefix("sqlite://")
                .unwrap_or(connection_string),
            _ => connection_string,
        };
        if target.is_empty() {
            return Err(ConnectionError::InvalidConfig("empty connection string".into()));
        }
        Ok(Self {
            driver,
            target: target.to_string(),
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Required: `REPORTKIT_DB_PATH`. Optional: `REPORTKIT_DB_DRIVER` (default sqlite).
    pub fn from_env() -> Result<Self, ConnectionError> {
        let driver = env::var("REPORTKIT_DB_DRIVER").unwrap_or_else(|_| "sqlite".to_string());
        let target = env::var("REPORTKIT_DB_PATH")
            .map_err(|_| ConnectionError::MissingEnvVar("REPORTKIT_DB_PATH".to_string()))?;
        Self::parse(&driver, &target)
    }

    pub fn is_in_memory(&self) -> bool {
        self.driver == Driver::Sqlite && self.target == ":memory:"
    }

    /// Get the driver name.
    pub fn driver_name(&self) -> &'static str {
        self.driver.as_str()
    }
}
