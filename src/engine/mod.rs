//! Database engines.
//!
//! An [`Engine`] is the handle everything else is built on: it runs one
//! statement at a time against a driver-managed connection pool, or hands
//! out a [`Transaction`] pinned to a single connection.
//!
//! Backends:
//! - PostgreSQL, MySQL and SQLite via sqlx pools
//! - SQL Server via tiberius

mod mssql;
mod mysql;
mod postgres;
mod sqlite;

pub use mssql::MsSqlEngine;
pub use mysql::MySqlEngine;
pub use postgres::PostgresEngine;
pub use sqlite::SqliteEngine;

use crate::connect::ConnectionSpec;
use crate::dialect::{SqlDialect, dialect_for};
use crate::error::DbResult;
use crate::flavor::Flavor;
use crate::frame::Frame;
use crate::value::Value;

use async_trait::async_trait;
use sqlx::Column;
use std::sync::Arc;

/// A connection pool (or single connection) for one database.
#[async_trait]
pub trait Engine: Send + Sync {
    fn flavor(&self) -> Flavor;

    fn dialect(&self) -> &'static dyn SqlDialect {
        dialect_for(self.flavor())
    }

    /// Run a statement that returns rows.
    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Frame>;

    /// Run a statement and return the affected row count.
    async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<u64>;

    /// Start a transaction on a dedicated connection.
    async fn begin(&self) -> DbResult<Box<dyn Transaction>>;

    /// Close the pool; later calls fail.
    async fn close(&self);
}

/// A transaction. Dropping it without [`Transaction::commit`] rolls back.
#[async_trait]
pub trait Transaction: Send {
    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Frame>;

    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64>;

    async fn commit(self: Box<Self>) -> DbResult<()>;

    async fn rollback(self: Box<Self>) -> DbResult<()>;
}

/// Open an engine for the connection's flavor.
pub async fn connect(spec: &ConnectionSpec) -> DbResult<Arc<dyn Engine>> {
    tracing::debug!(url = %spec.redacted_url(), "connecting");
    Ok(match spec.flavor {
        Flavor::Postgres => Arc::new(PostgresEngine::connect(&spec.url()?, spec.verbose).await?),
        Flavor::MySql => Arc::new(MySqlEngine::connect(&spec.url()?, spec.verbose).await?),
        Flavor::Sqlite => Arc::new(SqliteEngine::connect(&spec.url()?, spec.verbose).await?),
        Flavor::MsSql => Arc::new(MsSqlEngine::connect(spec).await?),
    })
}

/// Column names of a statement, for results with no row to read them from.
pub(crate) fn describe_columns<'e, E>(
    executor: E,
    sql: &'e str,
) -> impl std::future::Future<Output = Vec<String>> + Send + 'e
where
    E: sqlx::Executor<'e> + 'e,
{
    async move {
        match executor.describe(sql).await {
            Ok(described) => described
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            Err(e) => {
                tracing::debug!("cannot describe statement: {}", e);
                Vec::new()
            }
        }
    }
}

/// Log a statement before it is sent. `echo` raises it to INFO.
pub(crate) fn log_statement(echo: bool, flavor: Flavor, sql: &str, params: &[Value]) {
    if echo {
        tracing::info!(%flavor, params = params.len(), "{}", sql);
    } else {
        tracing::debug!(%flavor, params = params.len(), "{}", sql);
    }
}
