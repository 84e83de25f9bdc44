//! SQL dialect differences between the supported engines.
//!
//! A [`Dialect`] only renders text; it never touches a connection. The query
//! builder asks it for placeholders and the upsert clause so the rest of the
//! store can stay engine-agnostic.

use crate::schema::{self, SchemaDdl};

/// SQL text that differs per engine.
pub trait Dialect: Send + Sync {
    /// Engine name, for logging.
    fn name(&self) -> &'static str;

    /// The placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    /// Clause appended to `INSERT INTO entities (...) VALUES (...)` that turns
    /// it into an overwrite on a conflicting typed key.
    fn upsert_clause(&self) -> &'static str;

    /// The provisioning DDL.
    fn schema(&self) -> SchemaDdl;
}

#[derive(Debug, Clone, Copy)]
pub struct SqliteDialect;

#[derive(Debug, Clone, Copy)]
pub struct PostgresDialect;

#[derive(Debug, Clone, Copy)]
pub struct MysqlDialect;

const ON_CONFLICT: &str =
    "ON CONFLICT (typed_key) DO UPDATE SET sort_key = excluded.sort_key, payload = excluded.payload";

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("?{index}")
    }

    fn upsert_clause(&self) -> &'static str {
        ON_CONFLICT
    }

    fn schema(&self) -> SchemaDdl {
        schema::SQLITE
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn upsert_clause(&self) -> &'static str {
        ON_CONFLICT
    }

    fn schema(&self) -> SchemaDdl {
        schema::POSTGRES
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn upsert_clause(&self) -> &'static str {
        "ON DUPLICATE KEY UPDATE sort_key = VALUES(sort_key), payload = VALUES(payload)"
    }

    fn schema(&self) -> SchemaDdl {
        schema::MYSQL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_follow_engine_syntax() {
        assert_eq!(SqliteDialect.placeholder(2), "?2");
        assert_eq!(PostgresDialect.placeholder(2), "$2");
        assert_eq!(MysqlDialect.placeholder(2), "?");
    }

    #[test]
    fn upsert_clause_targets_typed_key() {
        assert!(SqliteDialect.upsert_clause().starts_with("ON CONFLICT (typed_key)"));
        assert_eq!(SqliteDialect.upsert_clause(), PostgresDialect.upsert_clause());
        assert!(MysqlDialect.upsert_clause().starts_with("ON DUPLICATE KEY UPDATE"));
    }
}
