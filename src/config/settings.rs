//! `reportkit.toml`: connections, formatting defaults and report defaults.
//!
//! ```toml
//! [connections.production]
//! driver = "sqlite"
//! connection_string = "${REPORTS_DB}"
//!
//! [connections.dev]
//! driver = "sqlite"
//! connection_string = "./data/dev.sqlite"
//!
//! [format]
//! date_format = "%d-%m-%Y"
//! decimal_format = ","
//! decimal_delimiter = "."
//!
//! [report]
//! dialect = "sqlite"
//! default_limit = 100
//! ```

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::connection::{ConnectionConfig, Driver};
use crate::model::FormatOptions;
use crate::sql::Dialect;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Contents of `reportkit.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub connections: HashMap<String, ConnectionSettings>,

    /// Report-wide formatting defaults; column options override them.
    pub format: FormatOptions,

    /// Report defaults.
    pub report: ReportSettings,
}

/// One `[connections.<name>]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionSettings {
    pub driver: String,

    /// Connection string (supports ${ENV_VAR} expansion).
    pub connection_string: String,
}

impl ConnectionSettings {
    pub fn driver_type(&self) -> Result<Driver, SettingsError> {
        Driver::from_str(&self.driver)
            .map_err(|_| SettingsError::UnsupportedDriver(self.driver.clone()))
    }

    /// Connection string with `${VAR}` references expanded.
    pub fn resolved_connection_string(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.connection_string)
    }

    /// Driver and expanded connection string, ready to connect.
    pub fn to_config(&self) -> Result<ConnectionConfig, SettingsError> {
        let driver = self.driver_type()?;
        let resolved = self.resolved_connection_string()?;
        ConnectionConfig::parse(driver.as_str(), &resolved)
            .map_err(|e| SettingsError::InvalidConfig(e.to_string()))
    }
}

/// Report defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Dialect used when rendering SQL without a connection (`--output sql`).
    pub dialect: Dialect,

    /// Limit applied when a report sets none.
    pub default_limit: Option<u64>,
}

impl Settings {
    /// Parse and validate a settings file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }
        let settings: Settings = toml::from_str(&fs::read_to_string(path)?)?;
        settings.validate()?;
        debug!(path = %path.display(), connections = settings.connections.len(), "loaded settings");
        Ok(settings)
    }

    /// First settings file found, or defaults.
    ///
    /// `REPORTKIT_CONFIG` wins when set and must exist. Otherwise
    /// `./reportkit.toml`, then `<config dir>/reportkit/config.toml`.
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("REPORTKIT_CONFIG") {
            return Self::from_file(path);
        }
        let candidates = std::iter::once(PathBuf::from("reportkit.toml"))
            .chain(dirs::config_dir().map(|dir| dir.join("reportkit").join("config.toml")));
        for candidate in candidates {
            if candidate.is_file() {
                return Self::from_file(candidate);
            }
        }
        Ok(Settings::default())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.report.default_limit == Some(0) {
            return Err(SettingsError::InvalidConfig(
                "report.default_limit must be positive".into(),
            ));
        }
        self.connections
            .values()
            .try_for_each(|conn| conn.driver_type().map(drop))
    }

    pub fn get_connection(&self, name: &str) -> Result<&ConnectionSettings, SettingsError> {
        self.connections
            .get(name)
            .ok_or_else(|| SettingsError::ConnectionNotFound(name.to_string()))
    }

    /// The connection named "default", else the alphabetically first one.
    pub fn default_connection(&self) -> Option<(&str, &ConnectionSettings)> {
        match self.connections.get_key_value("default") {
            Some((name, conn)) => Some((name.as_str(), conn)),
            None => self
                .connections
                .iter()
                .min_by_key(|(name, _)| name.as_str())
                .map(|(name, conn)| (name.as_str(), conn)),
        }
    }
}

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(?:\{([^}]*)\}|([A-Za-z0-9_]+))").unwrap());

/// Substitute `${VAR}` and `$VAR` from the environment.
///
/// A `$` not followed by a name is kept as is. An unset variable is an error.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for caps in ENV_VAR.captures_iter(s) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1).or_else(|| caps.get(2))) else {
            continue;
        };
        let value = env::var(name.as_str()).map_err(|_| SettingsError::MissingEnvVar(name.as_str().to_string()))?;
        out.push_str(&s[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&s[last..]);
    Ok(out)
}
