//! SQLite engine, used for local files and in-memory scratch databases.

use super::{Engine, Transaction, describe_columns, log_statement};
use crate::error::{DbError, DbResult};
use crate::flavor::Flavor;
use crate::frame::Frame;
use crate::value::Value;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

#[derive(Clone)]
pub struct SqliteEngine {
    pool: SqlitePool,
    echo: bool,
}

impl SqliteEngine {
    /// Connect using a `sqlite:` URL. An in-memory database lives on a
    /// single connection that is never recycled.
    pub async fn connect(url: &str, echo: bool) -> DbResult<Self> {
        let options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };
        let pool = options
            .connect(url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;
        Ok(Self { pool, echo })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn bind<'q>(sql: &'q str, params: &'q [Value]) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(*v),
            Value::Int(v) => query.bind(*v),
            Value::Float(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
            Value::Bytes(v) => query.bind(v.as_slice()),
            // No native decimal; stored as text like the driver would for NUMERIC.
            Value::Decimal(v) => query.bind(v.to_string()),
            Value::Date(v) => query.bind(*v),
            Value::Time(v) => query.bind(*v),
            Value::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

fn rows_to_frame(rows: &[SqliteRow]) -> Frame {
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

/// SQLite types are per value, so the declared column type is only a hint.
/// Try it first, then fall back to the storage class of the value itself.
fn decode(row: &SqliteRow, i: usize) -> Value {
    let raw = match row.try_get_raw(i) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(column = i, "cannot read column: {}", e);
            return Value::Null;
        }
    };
    if raw.is_null() {
        return Value::Null;
    }
    let storage = raw.type_info().name().to_ascii_uppercase();
    let declared = row.columns()[i].type_info().name().to_ascii_uppercase();

    let typed = match declared.as_str() {
        "BOOLEAN" => row.try_get::<bool, _>(i).ok().map(Value::Bool),
        "DATE" => row.try_get::<NaiveDate, _>(i).ok().map(Value::Date),
        "TIME" => row.try_get::<NaiveTime, _>(i).ok().map(Value::Time),
        "DATETIME" => row.try_get::<NaiveDateTime, _>(i).ok().map(Value::Timestamp),
        _ => None,
    };
    if let Some(value) = typed {
        return value;
    }

    let by_storage = match storage.as_str() {
        "INTEGER" => row.try_get::<i64, _>(i).map(Value::Int),
        "REAL" => row.try_get::<f64, _>(i).map(Value::Float),
        "BLOB" => row.try_get::<Vec<u8>, _>(i).map(Value::Bytes),
        _ => row.try_get::<String, _>(i).map(Value::Text),
    };

    by_storage.unwrap_or_else(|e| {
        tracing::warn!(column = i, sql_type = %declared, "cannot decode column: {}", e);
        Value::Null
    })
}

#[async_trait]
impl Engine for SqliteEngine {
    fn flavor(&self) -> Flavor {
        Flavor::Sqlite
    }

    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Frame> {
        log_statement(self.echo, Flavor::Sqlite, sql, params);
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
        log_statement(self.echo, Flavor::Sqlite, sql, params);
        let result = bind(sql, params)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::Execution(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn begin(&self) -> DbResult<Box<dyn Transaction>> {
        log_statement(self.echo, Flavor::Sqlite, "BEGIN", &[]);
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))?;
        Ok(Box::new(SqliteTransaction { tx, echo: self.echo }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
    echo: bool,
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Frame> {
        log_statement(self.echo, Flavor::Sqlite, sql, params);
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
        log_statement(self.echo, Flavor::Sqlite, sql, params);
        let result = bind(sql, params)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DbError::Execution(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        log_statement(self.echo, Flavor::Sqlite, "COMMIT", &[]);
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        log_statement(self.echo, Flavor::Sqlite, "ROLLBACK", &[]);
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn memory() -> SqliteEngine {
        SqliteEngine::connect("sqlite::memory:", false).await.unwrap()
    }

    #[tokio::test]
    async fn test_query_decodes_storage_classes() {
        let engine = memory().await;
        let frame = engine
            .query("SELECT 1 AS i, 2.5 AS f, 'x' AS t, NULL AS n, ? AS p", &[Value::Int(7)])
            .await
            .unwrap();
        assert_eq!(frame.columns(), &["i", "f", "t", "n", "p"]);
        assert_eq!(
            frame.rows()[0],
            vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::from("x"),
                Value::Null,
                Value::Int(7)
            ]
        );
    }

    #[tokio::test]
    async fn test_declared_types_are_honoured() {
        let engine = memory().await;
        engine
            .execute("CREATE TABLE t (day DATE, seen DATETIME, ok BOOLEAN)", &[])
            .await
            .unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let seen = day.and_hms_opt(8, 30, 0).unwrap();
        engine
            .execute(
                "INSERT INTO t VALUES (?, ?, ?)",
                &[Value::Date(day), Value::Timestamp(seen), Value::Bool(true)],
            )
            .await
            .unwrap();

        let frame = engine.query("SELECT * FROM t", &[]).await.unwrap();
        assert_eq!(
            frame.rows()[0],
            vec![Value::Date(day), Value::Timestamp(seen), Value::Bool(true)]
        );
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let engine = memory().await;
        engine.execute("CREATE TABLE t (id INTEGER)", &[]).await.unwrap();

        let mut tx = engine.begin().await.unwrap();
        tx.execute("INSERT INTO t VALUES (1)", &[]).await.unwrap();
        tx.rollback().await.unwrap();

        let frame = engine.query("SELECT COUNT(*) FROM t", &[]).await.unwrap();
        assert_eq!(frame.scalar(), Some(&Value::Int(0)));
    }
}
