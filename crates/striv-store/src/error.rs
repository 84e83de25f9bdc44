//! Storage error types for striv-store.
//!
//! [`StoreError`] separates caller-visible conditions (missing entities,
//! rejected keys, malformed page tokens) from startup failures and
//! engine errors, which are propagated unretried.

use thiserror::Error;

/// Errors produced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A requested entity does not exist. Carries the typed key.
    #[error("no entity {0} found")]
    EntityNotFound(String),

    /// A type, id, sort key or relation value cannot be stored.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The configured backend identifier is unknown or not compiled in.
    #[error("unknown database backend: {0}")]
    UnknownBackend(String),

    /// The store configuration is malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The backend could not be reached or the database could not be created.
    #[error("connection error: {0}")]
    Connection(String),

    /// Schema provisioning failed for a reason other than an existing index.
    #[error("schema error: {0}")]
    Schema(String),

    /// A stored row did not have the expected shape.
    #[error("malformed row: {0}")]
    MalformedRow(String),

    /// The continuation token could not be decoded.
    #[error("invalid page token: {0}")]
    InvalidPageToken(String),

    /// A page request carried both an explicit range and a continuation token.
    #[error("pagination cannot be combined with range")]
    RangeWithPageToken,

    /// JSON serialization or deserialization of a payload failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite engine error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// PostgreSQL engine error.
    #[cfg(feature = "postgres")]
    #[error("postgres error: {0}")]
    Postgres(#[from] postgres::Error),

    /// MySQL engine error.
    #[cfg(feature = "mysql")]
    #[error("mysql error: {0}")]
    Mysql(#[from] mysql::Error),
}

impl StoreError {
    pub(crate) fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller's input rather than the backend.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidKey { .. }
                | StoreError::InvalidPageToken(_)
                | StoreError::RangeWithPageToken
        )
    }
}
