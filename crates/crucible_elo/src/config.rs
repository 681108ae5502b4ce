//! Engine configuration.
//!
//! # Responsibility
//! - Collect namespace, database, lock-wait and logging settings.
//! - Load them from `CRUCIBLE_*` environment variables with defaults.
//!
//! # Invariants
//! - A loaded config always carries a valid key namespace.
//! - Malformed values are rejected, never silently replaced by defaults.

use crate::db::{open_db_with_timeout, DbResult, DEFAULT_BUSY_TIMEOUT};
use crate::logging::default_log_level;
use crate::model::contest::{KeySpace, DEFAULT_NAMESPACE};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_NAMESPACE: &str = "CRUCIBLE_NAMESPACE";
pub const ENV_DB_PATH: &str = "CRUCIBLE_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "CRUCIBLE_BUSY_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "CRUCIBLE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "CRUCIBLE_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "crucible_elo.sqlite3";

static NAMESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:-]{0,63}$").expect("valid namespace regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidNamespace(String),
    InvalidNumber { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNamespace(value) => write!(
                f,
                "invalid key namespace `{value}`; expected 1-64 chars of [A-Za-z0-9_.:-]"
            ),
            Self::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer, got `{value}`")
            }
        }
    }
}

impl Error for ConfigError {}

/// Runtime settings for the rating engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Prefix of every contest key.
    pub namespace: String,
    /// SQLite database file shared by all workers.
    pub db_path: PathBuf,
    /// How long a write waits for the database lock before failing.
    pub busy_timeout_ms: u64,
    pub log_level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT.as_millis() as u64,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl EngineConfig {
    /// Loads the config from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the config through `lookup`, falling back to defaults for
    /// unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let read = |key: &str| {
            let value = lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());
            if value.is_none() {
                info!("event=config_default module=config key={key}");
            }
            value
        };

        let namespace = read(ENV_NAMESPACE).unwrap_or(defaults.namespace);
        validate_namespace(&namespace)?;

        let busy_timeout_ms = match read(ENV_BUSY_TIMEOUT_MS) {
            Some(value) => value.parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
                key: ENV_BUSY_TIMEOUT_MS,
                value,
            })?,
            None => defaults.busy_timeout_ms,
        };

        Ok(Self {
            namespace,
            db_path: read(ENV_DB_PATH).map_or(defaults.db_path, PathBuf::from),
            busy_timeout_ms,
            log_level: read(ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_dir: read(ENV_LOG_DIR).map(PathBuf::from),
        })
    }

    pub fn key_space(&self) -> KeySpace {
        KeySpace::new(self.namespace.clone())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Opens a worker connection to the configured database.
    pub fn open_connection(&self) -> DbResult<Connection> {
        open_db_with_timeout(&self.db_path, self.busy_timeout())
    }
}

/// Checks a key namespace against the allowed character set.
pub fn validate_namespace(namespace: &str) -> Result<(), ConfigError> {
    if NAMESPACE_RE.is_match(namespace) {
        Ok(())
    } else {
        Err(ConfigError::InvalidNamespace(namespace.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        validate_namespace, ConfigError, EngineConfig, ENV_BUSY_TIMEOUT_MS, ENV_DB_PATH,
        ENV_NAMESPACE,
    };
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn unset_keys_fall_back_to_defaults() {
        let config = EngineConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.key_space().ratings_key(3), "crucible_elo:3");
    }

    #[test]
    fn set_keys_override_defaults() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (ENV_NAMESPACE, "arena"),
            (ENV_DB_PATH, "/var/lib/arena.db"),
            (ENV_BUSY_TIMEOUT_MS, " 250 "),
        ]))
        .unwrap();
        assert_eq!(config.key_space().votes_key(9), "arena:9:votes");
        assert_eq!(config.db_path, PathBuf::from("/var/lib/arena.db"));
        assert_eq!(config.busy_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = EngineConfig::from_lookup(lookup_from(&[(ENV_BUSY_TIMEOUT_MS, "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));

        let err = EngineConfig::from_lookup(lookup_from(&[(ENV_NAMESPACE, "bad key")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidNamespace("bad key".to_string()));
    }

    #[test]
    fn namespace_pattern_allows_separators() {
        assert!(validate_namespace("crucible:elo").is_ok());
        assert!(validate_namespace("a.b-c_d").is_ok());
        assert!(validate_namespace(":leading").is_err());
        assert!(validate_namespace("").is_err());
    }
}
