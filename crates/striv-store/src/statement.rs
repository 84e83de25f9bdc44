//! Parameterized SQL statements.
//!
//! Every value supplied by a caller travels as a bound parameter; the only
//! thing ever rendered into SQL text is an integer limit. [`SqlBuilder`]
//! numbers placeholders through the active [`Dialect`].

use crate::dialect::Dialect;
use crate::key::{type_prefix, KEY_SEPARATOR};

/// A SQL string plus its positional parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Option<String>>,
}

pub(crate) struct SqlBuilder<'d> {
    dialect: &'d dyn Dialect,
    sql: String,
    params: Vec<Option<String>>,
}

impl<'d> SqlBuilder<'d> {
    pub(crate) fn new(dialect: &'d dyn Dialect, sql: &str) -> Self {
        SqlBuilder {
            dialect,
            sql: sql.to_string(),
            params: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    pub(crate) fn bind(&mut self, value: impl Into<Option<String>>) -> &mut Self {
        self.params.push(value.into());
        let placeholder = self.dialect.placeholder(self.params.len());
        self.sql.push_str(&placeholder);
        self
    }

    /// Binds every value, comma separated.
    pub(crate) fn bind_list(&mut self, values: &[String]) -> &mut Self {
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.bind(value.clone());
        }
        self
    }

    /// Restricts `typed_key` to the namespace of `typ`.
    ///
    /// Expressed as a half-open range rather than `LIKE` so that it is
    /// case-sensitive and wildcard-free on every engine: every key of the
    /// type sorts in `["typ:", "typ;")`.
    pub(crate) fn type_namespace(&mut self, typ: &str) -> &mut Self {
        self.push("typed_key >= ")
            .bind(type_prefix(typ))
            .push(" AND typed_key < ")
            .bind(namespace_end(typ))
    }

    pub(crate) fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }
}

fn namespace_end(typ: &str) -> String {
    let successor = char::from_u32(KEY_SEPARATOR as u32 + 1).unwrap_or(char::MAX);
    format!("{typ}{successor}")
}

pub(crate) fn select_by_keys(dialect: &dyn Dialect, typed_keys: &[String]) -> Statement {
    let mut b = SqlBuilder::new(dialect, "SELECT typed_key, payload FROM entities WHERE typed_key IN (");
    b.bind_list(typed_keys).push(")");
    b.finish()
}

pub(crate) fn upsert_entity(
    dialect: &dyn Dialect,
    typed_key: &str,
    sort_key: Option<String>,
    payload: String,
) -> Statement {
    let mut b = SqlBuilder::new(
        dialect,
        "INSERT INTO entities (typed_key, sort_key, payload) VALUES (",
    );
    b.bind(typed_key.to_string())
        .push(", ")
        .bind(sort_key)
        .push(", ")
        .bind(payload)
        .push(") ")
        .push(dialect.upsert_clause());
    b.finish()
}

pub(crate) fn insert_entity(
    dialect: &dyn Dialect,
    typed_key: &str,
    sort_key: Option<String>,
    payload: String,
) -> Statement {
    let mut b = SqlBuilder::new(
        dialect,
        "INSERT INTO entities (typed_key, sort_key, payload) VALUES (",
    );
    b.bind(typed_key.to_string())
        .push(", ")
        .bind(sort_key)
        .push(", ")
        .bind(payload)
        .push(")");
    b.finish()
}

pub(crate) fn delete_entity(dialect: &dyn Dialect, typed_key: &str) -> Statement {
    let mut b = SqlBuilder::new(dialect, "DELETE FROM entities WHERE typed_key = ");
    b.bind(typed_key.to_string());
    b.finish()
}

pub(crate) fn delete_entities_of_type(dialect: &dyn Dialect, typ: &str) -> Statement {
    let mut b = SqlBuilder::new(dialect, "DELETE FROM entities WHERE ");
    b.type_namespace(typ);
    b.finish()
}

pub(crate) fn delete_relations(dialect: &dyn Dialect, typed_key: &str) -> Statement {
    let mut b = SqlBuilder::new(dialect, "DELETE FROM relations WHERE typed_key = ");
    b.bind(typed_key.to_string());
    b.finish()
}

pub(crate) fn delete_relations_of_type(dialect: &dyn Dialect, typ: &str) -> Statement {
    let mut b = SqlBuilder::new(dialect, "DELETE FROM relations WHERE ");
    b.type_namespace(typ);
    b.finish()
}

pub(crate) fn insert_relation(
    dialect: &dyn Dialect,
    typed_key: &str,
    relation: &str,
    relation_key: &str,
) -> Statement {
    let mut b = SqlBuilder::new(
        dialect,
        "INSERT INTO relations (typed_key, relation, relation_key) VALUES (",
    );
    b.bind(typed_key.to_string())
        .push(", ")
        .bind(relation.to_string())
        .push(", ")
        .bind(relation_key.to_string())
        .push(")");
    b.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MysqlDialect, PostgresDialect, SqliteDialect};

    #[test]
    fn select_by_keys_binds_every_key() {
        let keys = vec!["job:a".to_string(), "job:b".to_string()];
        let stmt = select_by_keys(&PostgresDialect, &keys);
        assert_eq!(
            stmt.sql,
            "SELECT typed_key, payload FROM entities WHERE typed_key IN ($1, $2)"
        );
        assert_eq!(stmt.params, vec![Some("job:a".into()), Some("job:b".into())]);
    }

    #[test]
    fn upsert_uses_dialect_clause() {
        let stmt = upsert_entity(&MysqlDialect, "job:a", None, "{}".into());
        assert_eq!(
            stmt.sql,
            "INSERT INTO entities (typed_key, sort_key, payload) VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE sort_key = VALUES(sort_key), payload = VALUES(payload)"
        );
        assert_eq!(stmt.params[1], None);

        let stmt = upsert_entity(&SqliteDialect, "job:a", Some("a".into()), "{}".into());
        assert!(stmt.sql.contains("VALUES (?1, ?2, ?3) ON CONFLICT (typed_key)"));
    }

    #[test]
    fn type_namespace_is_a_half_open_range() {
        let stmt = delete_entities_of_type(&SqliteDialect, "job");
        assert_eq!(
            stmt.sql,
            "DELETE FROM entities WHERE typed_key >= ?1 AND typed_key < ?2"
        );
        assert_eq!(stmt.params, vec![Some("job:".into()), Some("job;".into())]);
    }

    #[test]
    fn hostile_values_stay_out_of_sql_text() {
        let stmt = insert_relation(&SqliteDialect, "job:a", "dvalue", "x'; DROP TABLE entities; --");
        assert!(!stmt.sql.contains("DROP"));
        assert_eq!(stmt.params[2].as_deref(), Some("x'; DROP TABLE entities; --"));
    }
}
