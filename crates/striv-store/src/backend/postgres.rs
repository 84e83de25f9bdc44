//! PostgreSQL backend (feature `postgres`).
//!
//! Uses the synchronous `postgres` client over a single connection without
//! TLS. Key columns use `COLLATE "C"` so ordering is bytewise.

use postgres::error::SqlState;
use postgres::types::ToSql;
use postgres::{Client, Config, NoTls};
use tracing::{debug, info};

use super::{provision, Backend, Row, Transaction};
use crate::config::validate_database_name;
use crate::dialect::{Dialect, PostgresDialect};
use crate::error::StoreError;
use crate::statement::Statement;

/// Database used to issue `CREATE DATABASE` from.
const MAINTENANCE_DB: &str = "postgres";

pub struct PostgresBackend {
    client: Client,
}

impl PostgresBackend {
    /// Connects to `url`, creating the target database first when
    /// `create_database` is set.
    pub fn connect(url: &str, create_database: bool) -> Result<Self, StoreError> {
        let config: Config = url
            .parse()
            .map_err(|err: postgres::Error| StoreError::Config(err.to_string()))?;
        if create_database {
            ensure_database(&config)?;
        }
        let client = config
            .connect(NoTls)
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        debug!(dbname = config.get_dbname(), "connected to postgres");
        Ok(PostgresBackend { client })
    }
}

fn ensure_database(config: &Config) -> Result<(), StoreError> {
    let dbname = config
        .get_dbname()
        .ok_or_else(|| StoreError::Config("postgres url names no database".to_string()))?
        .to_string();
    validate_database_name(&dbname)?;

    let mut maintenance = config.clone();
    maintenance.dbname(MAINTENANCE_DB);
    let mut client = maintenance
        .connect(NoTls)
        .map_err(|err| StoreError::Connection(err.to_string()))?;
    let exists = client
        .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&dbname])?
        .is_some();
    if !exists {
        client
            .batch_execute(&format!("CREATE DATABASE \"{dbname}\""))
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        info!(dbname = %dbname, "created postgres database");
    }
    Ok(())
}

fn bind(params: &[Option<String>]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

fn into_row(row: &postgres::Row) -> Result<Row, StoreError> {
    (0..row.len())
        .map(|i| row.try_get::<_, Option<String>>(i).map_err(StoreError::from))
        .collect()
}

impl Backend for PostgresBackend {
    fn dialect(&self) -> &'static dyn Dialect {
        &PostgresDialect
    }

    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        let client = &mut self.client;
        provision(
            &PostgresDialect,
            |sql| client.batch_execute(sql),
            |err: &postgres::Error| err.code() == Some(&SqlState::DUPLICATE_TABLE),
        )
    }

    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        let rows = self.client.query(statement.sql.as_str(), &bind(&statement.params))?;
        rows.iter().map(into_row).collect()
    }

    fn transaction(&mut self) -> Result<Box<dyn Transaction + '_>, StoreError> {
        let tx = self.client.transaction()?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

struct PostgresTransaction<'a> {
    tx: postgres::Transaction<'a>,
}

impl Transaction for PostgresTransaction<'_> {
    fn execute(&mut self, statement: &Statement) -> Result<u64, StoreError> {
        Ok(self
            .tx
            .execute(statement.sql.as_str(), &bind(&statement.params))?)
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }
}
