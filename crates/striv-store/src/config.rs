//! Store configuration: which backend to use and how to reach it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;

/// Path used by SQLite when none is configured.
pub const IN_MEMORY: &str = ":memory:";

/// Backend selection plus its connection parameters.
///
/// Serialized with a `backend` tag, e.g.
/// `{"backend": "postgres", "url": "postgres://...", "create_database": true}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    Sqlite {
        #[serde(default)]
        path: Option<String>,
    },
    Postgres {
        url: String,
        #[serde(default)]
        create_database: bool,
    },
    Mysql {
        url: String,
        #[serde(default)]
        create_database: bool,
    },
}

impl StoreConfig {
    pub fn sqlite_in_memory() -> Self {
        StoreConfig::Sqlite { path: None }
    }

    pub fn sqlite(path: impl Into<String>) -> Self {
        StoreConfig::Sqlite {
            path: Some(path.into()),
        }
    }

    /// Builds a config from a backend identifier and a JSON object of
    /// backend-specific parameters (the shape accepted on the command line).
    pub fn from_parts(store_type: &str, params: Value) -> Result<Self, StoreError> {
        let mut params = match params {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(StoreError::Config(format!(
                    "store parameters must be a JSON object, got {other}"
                )))
            }
        };
        match store_type {
            "sqlite" | "postgres" | "mysql" => {}
            other => return Err(StoreError::UnknownBackend(other.to_string())),
        }
        params.insert("backend".to_string(), Value::String(store_type.to_string()));
        serde_json::from_value(Value::Object(params))
            .map_err(|err| StoreError::Config(err.to_string()))
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            StoreConfig::Sqlite { .. } => "sqlite",
            StoreConfig::Postgres { .. } => "postgres",
            StoreConfig::Mysql { .. } => "mysql",
        }
    }

    /// The SQLite database path, defaulting to an in-memory database.
    pub fn sqlite_path(&self) -> Option<&str> {
        match self {
            StoreConfig::Sqlite { path } => Some(path.as_deref().unwrap_or(IN_MEMORY)),
            _ => None,
        }
    }
}

/// Rejects database names that cannot be safely placed in DDL text.
#[cfg_attr(not(any(feature = "postgres", feature = "mysql")), allow(dead_code))]
pub(crate) fn validate_database_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(StoreError::Config(format!(
            "database name {name:?} must be a plain identifier"
        )))
    }
}
