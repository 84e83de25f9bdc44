//! DDL for the two tables every backend provisions.
//!
//! The persisted layout is identical everywhere:
//!
//! - `entities (typed_key PRIMARY KEY, sort_key, payload)` with an index on
//!   `sort_key`
//! - `relations (typed_key, relation, relation_key)` with indexes on
//!   `(relation, relation_key)` and `typed_key`
//!
//! Only column types and collations differ. Sort keys compare bytewise and
//! keys compare case-sensitively on every engine. MySQL uses the NO PAD
//! `utf8mb4_0900_bin` collation (MySQL 8.0+) so trailing spaces are
//! significant there as well.

/// The statements a backend runs, in order, to provision its schema.
///
/// Table statements are idempotent through `IF NOT EXISTS`. Index
/// statements may fail with "already exists" on engines without
/// `CREATE INDEX IF NOT EXISTS`; backends swallow exactly that failure.
#[derive(Debug, Clone, Copy)]
pub struct SchemaDdl {
    pub tables: &'static [&'static str],
    pub indexes: &'static [&'static str],
}

pub const SQLITE: SchemaDdl = SchemaDdl {
    tables: &[
        "CREATE TABLE IF NOT EXISTS entities (
            typed_key TEXT PRIMARY KEY,
            sort_key TEXT,
            payload TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS relations (
            typed_key TEXT NOT NULL,
            relation TEXT NOT NULL,
            relation_key TEXT NOT NULL
        )",
    ],
    indexes: &[
        "CREATE INDEX IF NOT EXISTS entities_sort_key ON entities (sort_key)",
        "CREATE INDEX IF NOT EXISTS relations_lookup ON relations (relation, relation_key)",
        "CREATE INDEX IF NOT EXISTS relations_typed_key ON relations (typed_key)",
    ],
};

pub const POSTGRES: SchemaDdl = SchemaDdl {
    tables: &[
        r#"CREATE TABLE IF NOT EXISTS entities (
            typed_key VARCHAR(128) COLLATE "C" PRIMARY KEY,
            sort_key VARCHAR(128) COLLATE "C",
            payload TEXT NOT NULL
        )"#,
        r#"CREATE TABLE IF NOT EXISTS relations (
            typed_key VARCHAR(128) COLLATE "C" NOT NULL,
            relation VARCHAR(128) COLLATE "C" NOT NULL,
            relation_key VARCHAR(128) COLLATE "C" NOT NULL
        )"#,
    ],
    indexes: &[
        "CREATE INDEX IF NOT EXISTS entities_sort_key ON entities (sort_key)",
        "CREATE INDEX IF NOT EXISTS relations_lookup ON relations (relation, relation_key)",
        "CREATE INDEX IF NOT EXISTS relations_typed_key ON relations (typed_key)",
    ],
};

pub const MYSQL: SchemaDdl = SchemaDdl {
    tables: &[
        "CREATE TABLE IF NOT EXISTS entities (
            typed_key VARCHAR(128) NOT NULL PRIMARY KEY,
            sort_key VARCHAR(128),
            payload LONGTEXT NOT NULL
        ) CHARACTER SET utf8mb4 COLLATE utf8mb4_0900_bin",
        "CREATE TABLE IF NOT EXISTS relations (
            typed_key VARCHAR(128) NOT NULL,
            relation VARCHAR(128) NOT NULL,
            relation_key VARCHAR(128) NOT NULL
        ) CHARACTER SET utf8mb4 COLLATE utf8mb4_0900_bin",
    ],
    // MySQL has no CREATE INDEX IF NOT EXISTS.
    indexes: &[
        "CREATE INDEX entities_sort_key ON entities (sort_key)",
        "CREATE INDEX relations_lookup ON relations (relation, relation_key)",
        "CREATE INDEX relations_typed_key ON relations (typed_key)",
    ],
};

impl SchemaDdl {
    /// All statements, tables first.
    pub fn statements(&self) -> impl Iterator<Item = (&'static str, bool)> + '_ {
        self.tables
            .iter()
            .map(|sql| (*sql, false))
            .chain(self.indexes.iter().map(|sql| (*sql, true)))
    }
}
