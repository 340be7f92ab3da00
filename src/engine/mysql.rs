//! MySQL / MariaDB engine on a sqlx pool.

use super::{Engine, Transaction, describe_columns, log_statement};
use crate::error::{DbError, DbResult};
use crate::flavor::Flavor;
use crate::frame::Frame;
use crate::value::Value;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::{MySql, MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row, TypeInfo};

#[derive(Clone)]
pub struct MySqlEngine {
    pool: MySqlPool,
    echo: bool,
}

impl MySqlEngine {
    /// Connect using a `mysql://` URL.
    pub async fn connect(url: &str, echo: bool) -> DbResult<Self> {
        let pool = MySqlPoolOptions::new()
            .connect(url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;
        Ok(Self { pool, echo })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn bind<'q>(sql: &'q str, params: &'q [Value]) -> Query<'q, MySql, MySqlArguments> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(*v),
            Value::Int(v) => query.bind(*v),
            Value::Float(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
            Value::Bytes(v) => query.bind(v.as_slice()),
            Value::Decimal(v) => query.bind(*v),
            Value::Date(v) => query.bind(*v),
            Value::Time(v) => query.bind(*v),
            Value::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

fn rows_to_frame(rows: &[MySqlRow]) -> Frame {
    let columns = rows
        .first()
        .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let rows = rows
        .iter()
        .map(|row| (0..row.columns().len()).map(|i| decode(row, i)).collect())
        .collect();
    Frame::from_parts(columns, rows)
}

fn int<T: Into<i64>>(v: Option<T>) -> Value {
    v.map(|x| Value::Int(x.into())).unwrap_or(Value::Null)
}

fn decode(row: &MySqlRow, i: usize) -> Value {
    let type_name = row.columns()[i].type_info().name().to_ascii_uppercase();

    let typed = match type_name.as_str() {
        "BOOLEAN" => row.try_get::<Option<bool>, _>(i).map(Value::from),
        "TINYINT" => row.try_get::<Option<i8>, _>(i).map(int),
        "SMALLINT" => row.try_get::<Option<i16>, _>(i).map(int),
        "MEDIUMINT" | "INT" => row.try_get::<Option<i32>, _>(i).map(int),
        "BIGINT" => row.try_get::<Option<i64>, _>(i).map(Value::from),
        "TINYINT UNSIGNED" => row.try_get::<Option<u8>, _>(i).map(int),
        "SMALLINT UNSIGNED" => row.try_get::<Option<u16>, _>(i).map(int),
        "MEDIUMINT UNSIGNED" | "INT UNSIGNED" => row.try_get::<Option<u32>, _>(i).map(int),
        "BIGINT UNSIGNED" => row.try_get::<Option<u64>, _>(i).map(|v| match v {
            Some(x) => i64::try_from(x)
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Decimal(Decimal::from(x))),
            None => Value::Null,
        }),
        "FLOAT" => row
            .try_get::<Option<f32>, _>(i)
            .map(|v| v.map(|x| Value::Float(x.into())).unwrap_or(Value::Null)),
        "DOUBLE" => row.try_get::<Option<f64>, _>(i).map(Value::from),
        "DECIMAL" => row.try_get::<Option<Decimal>, _>(i).map(Value::from),
        "DATE" => row.try_get::<Option<NaiveDate>, _>(i).map(Value::from),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(i)
            .map(|v| v.map(Value::Time).unwrap_or(Value::Null)),
        "DATETIME" => row.try_get::<Option<NaiveDateTime>, _>(i).map(Value::from),
        "TIMESTAMP" => row
            .try_get::<Option<DateTime<Utc>>, _>(i)
            .map(|v| v.map(|ts| Value::Timestamp(ts.naive_utc())).unwrap_or(Value::Null)),
        "JSON" => row
            .try_get::<Option<serde_json::Value>, _>(i)
            .map(|v| v.map(|j| Value::Text(j.to_string())).unwrap_or(Value::Null)),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => row
            .try_get::<Option<Vec<u8>>, _>(i)
            .map(|v| v.map(Value::Bytes).unwrap_or(Value::Null)),
        _ => row.try_get::<Option<String>, _>(i).map(Value::from),
    };

    typed.unwrap_or_else(|e| {
        tracing::warn!(column = i, sql_type = %type_name, "cannot decode column: {}", e);
        Value::Null
    })
}

#[async_trait]
impl Engine for MySqlEngine {
    fn flavor(&self) -> Flavor {
        Flavor::MySql
    }

    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Frame> {
        log_statement(self.echo, Flavor::MySql, sql, params);
        let rows = bind(sql, params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DbError::Execution(e.to_string()))?;
        if rows.is_empty() {
            return Ok(Frame::new(describe_columns(&self.pool, sql).await));
        }
        Ok(rows_to_frame(&rows))
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<u64> {
        log_statement(self.echo, Flavor::MySql, sql, params);
        let result = bind(sql, params)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::Execution(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn begin(&self) -> DbResult<Box<dyn Transaction>> {
        log_statement(self.echo, Flavor::MySql, "BEGIN", &[]);
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))?;
        Ok(Box::new(MySqlTransaction { tx, echo: self.echo }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

struct MySqlTransaction {
    tx: sqlx::Transaction<'static, MySql>,
    echo: bool,
}

#[async_trait]
impl Transaction for MySqlTransaction {
    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Frame> {
        log_statement(self.echo, Flavor::MySql, sql, params);
        let rows = bind(sql, params)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| DbError::Execution(e.to_string()))?;
        if rows.is_empty() {
            return Ok(Frame::new(describe_columns(&mut *self.tx, sql).await));
        }
        Ok(rows_to_frame(&rows))
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        log_statement(self.echo, Flavor::MySql, sql, params);
        let result = bind(sql, params)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DbError::Execution(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        log_statement(self.echo, Flavor::MySql, "COMMIT", &[]);
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        log_statement(self.echo, Flavor::MySql, "ROLLBACK", &[]);
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))
    }
}
