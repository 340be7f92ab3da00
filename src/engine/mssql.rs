//! SQL Server engine on a single tiberius connection.
//!
//! Statements without parameters go out as plain batches so session-scoped
//! objects (`#temp` tables) outlive the statement that created them.
//! Parameterized statements go through `sp_executesql`.

use super::{Engine, Transaction, log_statement};
use crate::connect::ConnectionSpec;
use crate::error::{DbError, DbResult};
use crate::flavor::Flavor;
use crate::frame::Frame;
use crate::value::Value;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::borrow::Cow;
use std::sync::Arc;
use tiberius::{AuthMethod, Client, ColumnData, Config, Row, ToSql};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

type MsClient = Client<Compat<TcpStream>>;

fn exec_err(e: tiberius::error::Error) -> DbError {
    DbError::Execution(e.to_string())
}

impl ToSql for Value {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            Value::Null => ColumnData::String(None),
            Value::Bool(v) => ColumnData::Bit(Some(*v)),
            Value::Int(v) => ColumnData::I64(Some(*v)),
            Value::Float(v) => ColumnData::F64(Some(*v)),
            Value::Text(v) => ColumnData::String(Some(Cow::Borrowed(v.as_str()))),
            Value::Bytes(v) => ColumnData::Binary(Some(Cow::Borrowed(v.as_slice()))),
            Value::Decimal(v) => v.to_sql(),
            Value::Date(v) => v.to_sql(),
            Value::Time(v) => v.to_sql(),
            Value::Timestamp(v) => v.to_sql(),
        }
    }
}

fn param_refs(params: &[Value]) -> Vec<&dyn ToSql> {
    params.iter().map(|p| p as &dyn ToSql).collect()
}

/// Return the first probe that matches the column's wire type. A matching
/// probe that yields `None` means SQL NULL.
macro_rules! probe {
    ($row:expr, $idx:expr, $ty:ty, $map:expr) => {
        match $row.try_get::<$ty, _>($idx) {
            Ok(Some(v)) => return ($map)(v),
            Ok(None) => return Value::Null,
            Err(_) => {}
        }
    };
}

fn decode(row: &Row, idx: usize) -> Value {
    probe!(row, idx, bool, Value::Bool);
    probe!(row, idx, u8, |v: u8| Value::Int(v.into()));
    probe!(row, idx, i16, |v: i16| Value::Int(v.into()));
    probe!(row, idx, i32, |v: i32| Value::Int(v.into()));
    probe!(row, idx, i64, Value::Int);
    probe!(row, idx, f32, |v: f32| Value::Float(v.into()));
    probe!(row, idx, f64, Value::Float);
    probe!(row, idx, Decimal, Value::Decimal);
    probe!(row, idx, &str, |v: &str| Value::Text(v.to_string()));
    probe!(row, idx, uuid::Uuid, |v: uuid::Uuid| Value::Text(v.to_string()));
    probe!(row, idx, NaiveDateTime, Value::Timestamp);
    probe!(row, idx, NaiveDate, Value::Date);
    probe!(row, idx, NaiveTime, Value::Time);
    probe!(row, idx, DateTime<Utc>, |v: DateTime<Utc>| Value::Timestamp(v.naive_utc()));
    probe!(row, idx, &[u8], |v: &[u8]| Value::Bytes(v.to_vec()));

    tracing::warn!(column = idx, "cannot decode column");
    Value::Null
}

struct Conn {
    client: Option<MsClient>,
    /// A transaction was started and never finished.
    open_tx: bool,
}

impl Conn {
    fn client(&mut self) -> DbResult<&mut MsClient> {
        self.client
            .as_mut()
            .ok_or_else(|| DbError::Connection("connection is closed".to_string()))
    }

    /// Roll back whatever a dropped transaction left open.
    async fn reset(&mut self) -> DbResult<()> {
        if self.open_tx {
            tracing::debug!("rolling back abandoned transaction");
            self.batch("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await?;
            self.open_tx = false;
        }
        Ok(())
    }

    async fn batch(&mut self, sql: &str) -> DbResult<Vec<Vec<Row>>> {
        let stream = self.client()?.simple_query(sql).await.map_err(exec_err)?;
        stream.into_results().await.map_err(exec_err)
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Frame> {
        let refs = param_refs(params);
        let client = self.client()?;
        let mut stream = if params.is_empty() {
            client.simple_query(sql).await
        } else {
            client.query(sql, &refs).await
        }
        .map_err(exec_err)?;

        let columns: Vec<String> = stream
            .columns()
            .await
            .map_err(exec_err)?
            .map(|cols| cols.iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let rows = stream.into_first_result().await.map_err(exec_err)?;
        let rows = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| decode(row, i)).collect())
            .collect();
        Ok(Frame::from_parts(columns, rows))
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        if !params.is_empty() {
            let refs = param_refs(params);
            let result = self.client()?.execute(sql, &refs).await.map_err(exec_err)?;
            return Ok(result.total());
        }

        // Plain batches report no counts; ask the session instead.
        let batch = format!(
            "{};\nSELECT CAST(@@ROWCOUNT AS BIGINT)",
            sql.trim().trim_end_matches(';')
        );
        let results = self.batch(&batch).await?;
        let count = results
            .last()
            .and_then(|rows| rows.first())
            .and_then(|row| row.try_get::<i64, _>(0).ok().flatten())
            .unwrap_or(0);
        Ok(count.max(0) as u64)
    }
}

/// A single SQL Server session shared behind a mutex.
#[derive(Clone)]
pub struct MsSqlEngine {
    conn: Arc<Mutex<Conn>>,
    echo: bool,
}

impl MsSqlEngine {
    pub async fn connect(spec: &ConnectionSpec) -> DbResult<Self> {
        let (host, _) = spec.host_port();

        let mut config = Config::new();
        config.host(&host);
        if let Some(port) = spec.port() {
            config.port(port);
        }
        config.database(&spec.database);
        config.authentication(AuthMethod::sql_server(
            spec.user.as_deref().unwrap_or_default(),
            spec.password.as_deref().unwrap_or_default(),
        ));
        config.trust_cert();

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| DbError::Connection(format!("{}: {}", spec.redacted_url(), e)))?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| DbError::Connection(format!("{}: {}", spec.redacted_url(), e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(Conn {
                client: Some(client),
                open_tx: false,
            })),
            echo: spec.verbose,
        })
    }

    async fn acquire(&self) -> DbResult<OwnedMutexGuard<Conn>> {
        let mut conn = self.conn.clone().lock_owned().await;
        conn.reset().await?;
        Ok(conn)
    }
}

#[async_trait]
impl Engine for MsSqlEngine {
    fn flavor(&self) -> Flavor {
        Flavor::MsSql
    }

    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Frame> {
        log_statement(self.echo, Flavor::MsSql, sql, params);
        self.acquire().await?.query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<u64> {
        log_statement(self.echo, Flavor::MsSql, sql, params);
        self.acquire().await?.execute(sql, params).await
    }

    async fn begin(&self) -> DbResult<Box<dyn Transaction>> {
        log_statement(self.echo, Flavor::MsSql, "BEGIN TRANSACTION", &[]);
        let mut conn = self.acquire().await?;
        conn.batch("BEGIN TRANSACTION")
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))?;
        conn.open_tx = true;
        Ok(Box::new(MsSqlTransaction {
            conn,
            echo: self.echo,
        }))
    }

    async fn close(&self) {
        let mut conn = self.conn.lock().await;
        if let Some(client) = conn.client.take() {
            if let Err(e) = client.close().await {
                tracing::warn!("error closing SQL Server connection: {}", e);
            }
        }
    }
}

/// Holds the session lock until commit or rollback. If dropped first, the
/// next caller to take the lock rolls the transaction back.
struct MsSqlTransaction {
    conn: OwnedMutexGuard<Conn>,
    echo: bool,
}

impl MsSqlTransaction {
    async fn finish(mut self, sql: &str) -> DbResult<()> {
        log_statement(self.echo, Flavor::MsSql, sql, &[]);
        self.conn
            .batch(sql)
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))?;
        self.conn.open_tx = false;
        Ok(())
    }
}

#[async_trait]
impl Transaction for MsSqlTransaction {
    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Frame> {
        log_statement(self.echo, Flavor::MsSql, sql, params);
        self.conn.query(sql, params).await
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        log_statement(self.echo, Flavor::MsSql, sql, params);
        self.conn.execute(sql, params).await
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        self.finish("COMMIT TRANSACTION").await
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        self.finish("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_map_to_tds_types() {
        assert!(matches!(Value::Null.to_sql(), ColumnData::String(None)));
        assert!(matches!(Value::Int(5).to_sql(), ColumnData::I64(Some(5))));
        assert!(matches!(Value::Bool(true).to_sql(), ColumnData::Bit(Some(true))));
        match Value::from("abc").to_sql() {
            ColumnData::String(Some(s)) => assert_eq!(s, "abc"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
