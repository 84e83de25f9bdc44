//! MySQL backend (feature `mysql`).
//!
//! MySQL lacks `CREATE INDEX IF NOT EXISTS`, so re-provisioning an existing
//! database hits error 1061 (`ER_DUP_KEYNAME`), which is swallowed. Tables
//! use the NO PAD `utf8mb4_0900_bin` collation so comparisons are
//! case-sensitive, code-point ordered and trailing spaces count. Requires
//! MySQL 8.0 or later.

use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder, Params, TxOpts, Value};
use tracing::{debug, info};

use super::{provision, Backend, Row, Transaction};
use crate::config::validate_database_name;
use crate::dialect::{Dialect, MysqlDialect};
use crate::error::StoreError;
use crate::statement::Statement;

/// `ER_DUP_KEYNAME`: duplicate key name.
const ER_DUP_KEYNAME: u16 = 1061;

pub struct MysqlBackend {
    conn: Conn,
}

impl MysqlBackend {
    /// Connects to `url`, creating the target database first when
    /// `create_database` is set.
    pub fn connect(url: &str, create_database: bool) -> Result<Self, StoreError> {
        let opts = Opts::from_url(url).map_err(|err| StoreError::Config(err.to_string()))?;
        if create_database {
            ensure_database(&opts)?;
        }
        let conn = Conn::new(opts).map_err(|err| StoreError::Connection(err.to_string()))?;
        debug!("connected to mysql");
        Ok(MysqlBackend { conn })
    }
}

fn ensure_database(opts: &Opts) -> Result<(), StoreError> {
    let dbname = opts
        .get_db_name()
        .ok_or_else(|| StoreError::Config("mysql url names no database".to_string()))?
        .to_string();
    validate_database_name(&dbname)?;

    let server_opts = OptsBuilder::from_opts(opts.clone()).db_name(None::<String>);
    let mut conn =
        Conn::new(server_opts).map_err(|err| StoreError::Connection(err.to_string()))?;
    conn.query_drop(format!("CREATE DATABASE IF NOT EXISTS `{dbname}`"))
        .map_err(|err| StoreError::Connection(err.to_string()))?;
    info!(dbname = %dbname, "ensured mysql database");
    Ok(())
}

fn bind(params: &[Option<String>]) -> Params {
    Params::from(
        params
            .iter()
            .map(|p| Value::from(p.clone()))
            .collect::<Vec<Value>>(),
    )
}

fn into_row(mut row: mysql::Row) -> Result<Row, StoreError> {
    (0..row.len())
        .map(|i| match row.take_opt::<Option<String>, usize>(i) {
            Some(Ok(value)) => Ok(value),
            Some(Err(err)) => Err(StoreError::MalformedRow(err.to_string())),
            None => Err(StoreError::MalformedRow(format!("column {i} is missing"))),
        })
        .collect()
}

fn is_duplicate_index(err: &mysql::Error) -> bool {
    matches!(err, mysql::Error::MySqlError(e) if e.code == ER_DUP_KEYNAME)
}

impl Backend for MysqlBackend {
    fn dialect(&self) -> &'static dyn Dialect {
        &MysqlDialect
    }

    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        let conn = &mut self.conn;
        provision(&MysqlDialect, |sql| conn.query_drop(sql), is_duplicate_index)
    }

    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        let rows: Vec<mysql::Row> = self
            .conn
            .exec(statement.sql.as_str(), bind(&statement.params))?;
        rows.into_iter().map(into_row).collect()
    }

    fn transaction(&mut self) -> Result<Box<dyn Transaction + '_>, StoreError> {
        let tx = self.conn.start_transaction(TxOpts::default())?;
        Ok(Box::new(MysqlTransaction { tx }))
    }
}

struct MysqlTransaction<'a> {
    tx: mysql::Transaction<'a>,
}

impl Transaction for MysqlTransaction<'_> {
    fn execute(&mut self, statement: &Statement) -> Result<u64, StoreError> {
        self.tx
            .exec_drop(statement.sql.as_str(), bind(&statement.params))?;
        Ok(self.tx.affected_rows())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }
}
