//! Transform-and-persist writer.
//!
//! A [`RecordWriter`] turns caller rows into [`Record`]s, which a
//! [`Session`] inserts (new records) or updates by key (persistent records)
//! inside one transaction. [`DbWriter::persist`] drives this in batches,
//! committing each batch on its own.
//!
//! ```rust,ignore
//! struct Staff { utln: String, email: String }
//!
//! impl Record for Staff {
//!     fn table_name(&self) -> &str { "rt_staff" }
//!     fn key_columns(&self) -> &[&str] { &["utln"] }
//!     fn to_row(&self) -> Vec<(&str, Value)> {
//!         vec![("utln", self.utln.as_str().into()), ("email", self.email.as_str().into())]
//!     }
//! }
//! ```

use crate::connect::ConnectionSpec;
use crate::dialect::SqlDialect;
use crate::engine::Transaction;
use crate::error::{DbError, DbResult};
use crate::frame::Frame;
use crate::interface::Database;
use crate::value::Value;

use async_trait::async_trait;
use std::collections::HashMap;

pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Whether a record already has a row in its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordState {
    #[default]
    New,
    Persistent,
}

/// A typed row of one table.
pub trait Record: Send + Sync {
    fn table_name(&self) -> &str;

    /// Columns identifying the row, used to update persistent records.
    fn key_columns(&self) -> &[&str];

    /// Column/value pairs in insert order.
    fn to_row(&self) -> Vec<(&str, Value)>;

    fn state(&self) -> RecordState {
        RecordState::New
    }
}

/// Pending records plus the transaction they will be written in.
pub struct Session {
    tx: Box<dyn Transaction>,
    dialect: &'static dyn SqlDialect,
    pending: Vec<Box<dyn Record>>,
    column_types: HashMap<String, HashMap<String, String>>,
    written: u64,
}

impl Session {
    pub async fn begin(db: &Database) -> DbResult<Self> {
        Ok(Self {
            tx: db.engine().begin().await?,
            dialect: db.dialect(),
            pending: Vec::new(),
            column_types: HashMap::new(),
            written: 0,
        })
    }

    pub fn add(&mut self, record: Box<dyn Record>) {
        self.pending.push(record);
    }

    pub fn add_all(&mut self, records: impl IntoIterator<Item = Box<dyn Record>>) {
        self.pending.extend(records);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Query inside the session's transaction. Pending records are flushed
    /// first so the query sees them.
    pub async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Frame> {
        self.flush().await?;
        self.tx.query(sql, params).await
    }

    /// Write every pending record; returns the affected row count.
    pub async fn flush(&mut self) -> DbResult<u64> {
        let mut affected = 0;
        for record in std::mem::take(&mut self.pending) {
            let table = record.table_name().to_string();
            let (columns, values): (Vec<&str>, Vec<Value>) = record.to_row().into_iter().unzip();
            if columns.is_empty() {
                continue;
            }
            let types = self.types_for(&table, &columns).await?;

            let stmt = match record.state() {
                RecordState::New => {
                    self.dialect
                        .insert_sql(&table, &columns, &[values], types.as_deref())
                }
                RecordState::Persistent => {
                    let keys = record.key_columns();
                    if keys.is_empty() {
                        return Err(DbError::NoMatchColumns(table));
                    }
                    if let Some(key) = keys
                        .iter()
                        .find(|k| !columns.iter().any(|c| c.eq_ignore_ascii_case(k)))
                    {
                        return Err(DbError::missing_column(*key, format!("record for '{}'", table)));
                    }
                    if columns.len() == keys.len() {
                        continue;
                    }
                    self.dialect
                        .update_sql(&table, &columns, &values, keys, types.as_deref())
                }
            };
            affected += self.tx.execute(&stmt.sql, &stmt.params).await?;
        }
        self.written += affected;
        Ok(affected)
    }

    /// Declared column types, looked up once per table.
    async fn types_for(
        &mut self,
        table: &str,
        columns: &[&str],
    ) -> DbResult<Option<Vec<Option<String>>>> {
        let Some(stmt) = self.dialect.column_types_sql(table) else {
            return Ok(None);
        };
        if !self.column_types.contains_key(table) {
            let frame = self.tx.query(&stmt.sql, &stmt.params).await?;
            let declared = frame
                .rows()
                .iter()
                .filter_map(|r| match (r.first()?.as_str(), r.get(1)?.as_str()) {
                    (Some(name), Some(ty)) => Some((name.to_ascii_lowercase(), ty.to_string())),
                    _ => None,
                })
                .collect();
            self.column_types.insert(table.to_string(), declared);
        }
        let declared = &self.column_types[table];
        Ok(Some(
            columns
                .iter()
                .map(|c| declared.get(&c.to_ascii_lowercase()).cloned())
                .collect(),
        ))
    }

    /// Flush and commit. Returns the rows affected over the whole session.
    pub async fn commit(mut self) -> DbResult<u64> {
        self.flush().await?;
        self.tx.commit().await?;
        Ok(self.written)
    }

    /// Discard pending records and roll back.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await
    }
}

/// Turns one input row into a record, possibly querying the session.
#[async_trait]
pub trait RecordWriter: Send + Sync {
    type Input: Send + Sync;

    async fn transform(
        &self,
        row: &Self::Input,
        session: &mut Session,
    ) -> DbResult<Box<dyn Record>>;
}

/// Persists rows through a [`RecordWriter`], one transaction per batch.
pub struct DbWriter<W> {
    db: Database,
    writer: W,
}

impl<W: RecordWriter> DbWriter<W> {
    /// MySQL on `localhost/rt_analytics` with statement echo on.
    pub async fn connect(user: &str, password: &str, writer: W) -> DbResult<Self> {
        let spec = ConnectionSpec::default()
            .credentials(user, password)
            .verbose(true);
        Ok(Self::with_database(Database::connect(&spec).await?, writer))
    }

    pub fn with_database(db: Database, writer: W) -> Self {
        Self { db, writer }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// [`DbWriter::persist`] in batches of [`DEFAULT_BATCH_SIZE`].
    pub async fn persist_all(&self, rows: &[W::Input]) -> DbResult<u64> {
        self.persist(rows, DEFAULT_BATCH_SIZE).await
    }

    /// Transform and write `rows` in batches of `batch_size`. A failing
    /// batch is rolled back and its error returned; earlier batches stay
    /// committed.
    pub async fn persist(&self, rows: &[W::Input], batch_size: usize) -> DbResult<u64> {
        let mut written = 0;
        for (n, batch) in rows.chunks(batch_size.max(1)).enumerate() {
            let mut session = Session::begin(&self.db).await?;
            if let Err(e) = self.stage(batch, &mut session).await {
                tracing::error!(batch = n, rows = batch.len(), "batch failed: {}", e);
                if let Err(rollback) = session.rollback().await {
                    tracing::warn!("rollback failed: {}", rollback);
                }
                return Err(e);
            }
            written += session.commit().await.inspect_err(|e| {
                tracing::error!(batch = n, rows = batch.len(), "batch failed: {}", e);
            })?;
        }
        Ok(written)
    }

    async fn stage(&self, batch: &[W::Input], session: &mut Session) -> DbResult<()> {
        let mut records = Vec::with_capacity(batch.len());
        for row in batch {
            records.push(self.writer.transform(row, session).await?);
        }
        session.add_all(records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SqliteEngine;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct Tag {
        id: i64,
        name: String,
        state: RecordState,
    }

    impl Record for Tag {
        fn table_name(&self) -> &str {
            "tags"
        }

        fn key_columns(&self) -> &[&str] {
            &["id"]
        }

        fn to_row(&self) -> Vec<(&str, Value)> {
            vec![("id", self.id.into()), ("name", self.name.as_str().into())]
        }

        fn state(&self) -> RecordState {
            self.state
        }
    }

    async fn db() -> Database {
        let engine = SqliteEngine::connect("sqlite::memory:", false).await.unwrap();
        let db = Database::with_engine(Arc::new(engine), "main");
        db.execute("CREATE TABLE tags (id INTEGER PRIMARY KEY, name TEXT)", &[])
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_session_inserts_and_updates() {
        let db = db().await;
        db.execute("INSERT INTO tags VALUES (1, 'old')", &[]).await.unwrap();

        let mut session = Session::begin(&db).await.unwrap();
        session.add(Box::new(Tag { id: 1, name: "new".into(), state: RecordState::Persistent }));
        session.add(Box::new(Tag { id: 2, name: "two".into(), state: RecordState::New }));
        assert_eq!(session.pending(), 2);

        let seen = session.query("SELECT COUNT(*) FROM tags", &[]).await.unwrap();
        assert_eq!(seen.scalar(), Some(&Value::Int(2)));
        session.commit().await.unwrap();

        let rows = db.fetch("SELECT id, name FROM tags ORDER BY id", &[]).await.unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Int(1), Value::from("new")],
                vec![Value::Int(2), Value::from("two")],
            ]
        );
    }

    #[tokio::test]
    async fn test_rolled_back_session_writes_nothing() {
        let db = db().await;
        {
            let mut session = Session::begin(&db).await.unwrap();
            session.add(Box::new(Tag { id: 9, name: "x".into(), state: RecordState::New }));
            session.rollback().await.unwrap();
        }
        assert_eq!(db.record_count("tags").await.unwrap(), 0);
    }
}
