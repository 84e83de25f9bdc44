//! Embedded SQLite backend.
//!
//! Opens a single long-lived connection. File databases use WAL mode; the
//! in-memory database (`:memory:`) is private to this connection. Write
//! transactions start with `BEGIN IMMEDIATE` so the write lock is taken up
//! front rather than on first write.

use rusqlite::{params_from_iter, Connection, TransactionBehavior};
use tracing::debug;

use super::{provision, Backend, Row, Transaction};
use crate::config::IN_MEMORY;
use crate::dialect::{Dialect, SqliteDialect};
use crate::error::StoreError;
use crate::statement::Statement;

pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Opens (or creates) the database at `path`; `:memory:` opens an
    /// in-memory database.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = if path == IN_MEMORY {
            Connection::open_in_memory()?
        } else {
            let conn = Connection::open(path)?;
            // WAL gives concurrent readers alongside the single writer.
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn
        };
        debug!(path, "opened sqlite database");
        Ok(SqliteBackend { conn })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::open(IN_MEMORY)
    }
}

impl Backend for SqliteBackend {
    fn dialect(&self) -> &'static dyn Dialect {
        &SqliteDialect
    }

    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        let conn = &self.conn;
        provision(
            &SqliteDialect,
            |sql| conn.execute(sql, []).map(|_| ()),
            |err: &rusqlite::Error| match err {
                rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.contains("already exists"),
                _ => false,
            },
        )
    }

    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        let mut stmt = self.conn.prepare_cached(&statement.sql)?;
        let columns = stmt.column_count();
        let rows = stmt.query_map(params_from_iter(statement.params.iter()), |row| {
            (0..columns)
                .map(|i| row.get::<_, Option<String>>(i))
                .collect::<Result<Row, _>>()
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn transaction(&mut self) -> Result<Box<dyn Transaction + '_>, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

struct SqliteTransaction<'c> {
    tx: rusqlite::Transaction<'c>,
}

impl Transaction for SqliteTransaction<'_> {
    fn execute(&mut self, statement: &Statement) -> Result<u64, StoreError> {
        let mut stmt = self.tx.prepare_cached(&statement.sql)?;
        let affected = stmt.execute(params_from_iter(statement.params.iter()))?;
        Ok(affected as u64)
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }
}
