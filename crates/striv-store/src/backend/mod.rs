//! Backend adapters: one per SQL engine, selected once by [`connect`].
//!
//! A [`Backend`] owns its connection, provisions the schema and executes
//! [`Statement`]s. Writes go through a [`Transaction`]; dropping one without
//! calling [`Transaction::commit`] rolls it back.

use tracing::info;

use crate::config::StoreConfig;
use crate::dialect::Dialect;
use crate::error::StoreError;
use crate::statement::Statement;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod sqlite;

#[cfg(feature = "mysql")]
pub use self::mysql::MysqlBackend;
#[cfg(feature = "postgres")]
pub use self::postgres::PostgresBackend;
pub use self::sqlite::SqliteBackend;

/// One result row. Every column the store reads is text or NULL.
pub type Row = Vec<Option<String>>;

/// Connection-owning adapter for one SQL engine.
pub trait Backend: Send {
    fn dialect(&self) -> &'static dyn Dialect;

    /// Creates tables and indexes if absent. Safe to call repeatedly.
    fn ensure_schema(&mut self) -> Result<(), StoreError>;

    /// Runs a read-only statement outside any explicit transaction.
    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>, StoreError>;

    /// Opens a write transaction.
    fn transaction(&mut self) -> Result<Box<dyn Transaction + '_>, StoreError>;
}

/// An open write transaction.
pub trait Transaction {
    /// Executes a statement, returning the number of affected rows.
    fn execute(&mut self, statement: &Statement) -> Result<u64, StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Connects to the configured backend and provisions its schema.
///
/// Fails fast: unknown or disabled backends, unreachable servers and schema
/// errors are all returned to the caller, which is expected to abort.
pub fn connect(config: &StoreConfig) -> Result<Box<dyn Backend>, StoreError> {
    let mut backend: Box<dyn Backend> = match config {
        StoreConfig::Sqlite { .. } => {
            let path = config.sqlite_path().unwrap_or(crate::config::IN_MEMORY);
            Box::new(SqliteBackend::open(path)?)
        }
        #[cfg(feature = "postgres")]
        StoreConfig::Postgres {
            url,
            create_database,
        } => Box::new(PostgresBackend::connect(url, *create_database)?),
        #[cfg(feature = "mysql")]
        StoreConfig::Mysql {
            url,
            create_database,
        } => Box::new(MysqlBackend::connect(url, *create_database)?),
        #[allow(unreachable_patterns)]
        other => {
            return Err(StoreError::UnknownBackend(format!(
                "{} (not compiled in)",
                other.backend_name()
            )))
        }
    };
    backend.ensure_schema()?;
    info!(backend = backend.dialect().name(), "store schema ready");
    Ok(backend)
}

/// Runs the provisioning DDL, swallowing only "index already exists".
pub(crate) fn provision<E, X>(
    dialect: &dyn Dialect,
    mut exec: X,
    is_duplicate_index: impl Fn(&E) -> bool,
) -> Result<(), StoreError>
where
    X: FnMut(&str) -> Result<(), E>,
    E: std::fmt::Display,
{
    for (sql, is_index) in dialect.schema().statements() {
        match exec(sql) {
            Ok(()) => {}
            Err(err) if is_index && is_duplicate_index(&err) => {
                tracing::debug!(backend = dialect.name(), "index already exists");
            }
            Err(err) => return Err(StoreError::Schema(err.to_string())),
        }
    }
    Ok(())
}

/// Reads column `index` of `row` as required text.
pub(crate) fn text(row: &Row, index: usize) -> Result<&str, StoreError> {
    row.get(index)
        .and_then(|c| c.as_deref())
        .ok_or_else(|| StoreError::MalformedRow(format!("column {index} is missing or NULL")))
}
