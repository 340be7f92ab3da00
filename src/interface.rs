//! The database interface.
//!
//! [`Database`] wraps an [`Engine`] with the operations callers use day to
//! day: reading tables into frames, scalar helpers, running SQL files, and
//! loading frames back with append, replace or upsert semantics.
//!
//! ```rust,ignore
//! let db = Database::connect(&ConnectionSpec::from_env()?).await?;
//! let staff = db.read_frame("rt_staff", Some(&["utln", "email"][..])).await?;
//! db.upsert_frame(&staff, "rt_staff_copy", &UpsertOptions::default()).await?;
//! ```

use crate::connect::ConnectionSpec;
use crate::dialect::{OnConflict, SqlDialect, Statement};
use crate::engine::{self, Engine, Transaction};
use crate::error::{DbError, DbResult};
use crate::flavor::Flavor;
use crate::frame::Frame;
use crate::template;
use crate::value::Value;

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// How [`Database::upsert_frame`] matches and resolves rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertOptions {
    /// Columns identifying a row. Defaults to the table's primary key.
    pub match_columns: Option<Vec<String>>,
    pub on_conflict: OnConflict,
}

impl UpsertOptions {
    pub fn matching<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            match_columns: Some(columns.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn ignore_conflicts(mut self) -> Self {
        self.on_conflict = OnConflict::Ignore;
        self
    }
}

/// A database handle: an engine plus the database (schema) it targets.
#[derive(Clone)]
pub struct Database {
    engine: Arc<dyn Engine>,
    database: String,
}

impl Database {
    pub async fn connect(spec: &ConnectionSpec) -> DbResult<Self> {
        let engine = engine::connect(spec).await?;
        Ok(Self::with_engine(engine, spec.database.clone()))
    }

    /// Wrap an engine that is already open.
    pub fn with_engine(engine: Arc<dyn Engine>, database: impl Into<String>) -> Self {
        Self {
            engine,
            database: database.into(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub fn flavor(&self) -> Flavor {
        self.engine.flavor()
    }

    pub fn dialect(&self) -> &'static dyn SqlDialect {
        self.engine.dialect()
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    pub async fn close(&self) {
        self.engine.close().await;
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// `SELECT cols FROM table`, or every column when `cols` is `None`.
    /// An empty table still yields its column names.
    pub async fn read_frame(&self, table: &str, cols: Option<&[&str]>) -> DbResult<Frame> {
        let sql = self.dialect().select_sql(table, cols);
        let frame = self.engine.query(&sql, &[]).await?;
        if !frame.is_empty() || !frame.columns().is_empty() {
            return Ok(frame);
        }
        match cols {
            Some(cols) if !cols.is_empty() => Ok(Frame::new(cols.iter().copied())),
            _ => Ok(Frame::new(self.columns(table).await?)),
        }
    }

    pub async fn read_sql(&self, sql: &str, params: &[Value]) -> DbResult<Frame> {
        self.engine.query(sql, params).await
    }

    /// Number of rows in `table`; 0 when it is empty.
    pub async fn record_count(&self, table: &str) -> DbResult<i64> {
        let sql = self.dialect().count_sql(table);
        let frame = self.engine.query(&sql, &[]).await?;
        Ok(frame.scalar().and_then(Value::as_i64).unwrap_or(0))
    }

    /// Latest value of `date_col`, or the server's current time when the
    /// table has no rows.
    pub async fn check_last_date(&self, date_col: &str, table: &str) -> DbResult<NaiveDateTime> {
        let sql = self.dialect().last_date_sql(table, date_col);
        let frame = self.engine.query(&sql, &[]).await?;
        let value = frame.scalar().cloned().unwrap_or(Value::Null);
        value.as_datetime().ok_or_else(|| {
            DbError::Decode(format!(
                "{}.{} is not a date or timestamp: {}",
                table, date_col, value
            ))
        })
    }

    pub async fn fetch(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Vec<Value>>> {
        Ok(self.engine.query(sql, params).await?.into_rows())
    }

    pub async fn fetch_one(&self, sql: &str, params: &[Value]) -> DbResult<Option<Vec<Value>>> {
        Ok(self.fetch(sql, params).await?.into_iter().next())
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Run one statement; returns the affected row count.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<u64> {
        self.engine.execute(sql, params).await
    }

    /// Read a SQL file, fill its `{name}` placeholders and run it.
    pub async fn execute_sql_file(
        &self,
        path: impl AsRef<Path>,
        format_strings: &HashMap<String, String>,
    ) -> DbResult<u64> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        let sql = template::render(text.trim(), format_strings)?;
        tracing::debug!(path = %path.display(), "running SQL file");
        self.engine.execute(&sql, &[]).await
    }

    // ------------------------------------------------------------------
    // Reflection
    // ------------------------------------------------------------------

    pub async fn has_table(&self, table: &str) -> DbResult<bool> {
        let stmt = self.dialect().table_exists_sql(table, &self.database);
        let frame = self.engine.query(&stmt.sql, &stmt.params).await?;
        Ok(frame.scalar().and_then(Value::as_i64).unwrap_or(0) > 0)
    }

    /// Column names of `table` in ordinal order.
    pub async fn columns(&self, table: &str) -> DbResult<Vec<String>> {
        let stmt = self.dialect().list_columns_sql(table, &self.database);
        self.names(&stmt).await
    }

    /// Primary key columns of `table`, empty when it has none.
    pub async fn primary_key(&self, table: &str) -> DbResult<Vec<String>> {
        let stmt = self.dialect().primary_key_sql(table, &self.database);
        self.names(&stmt).await
    }

    async fn names(&self, stmt: &Statement) -> DbResult<Vec<String>> {
        let frame = self.engine.query(&stmt.sql, &stmt.params).await?;
        Ok(frame
            .rows()
            .iter()
            .filter_map(|r| r.first().and_then(Value::as_str).map(str::to_string))
            .collect())
    }

    /// Declared types of `table` aligned with `columns`, for dialects that
    /// cast their placeholders.
    async fn column_types(
        &self,
        table: &str,
        columns: &[String],
    ) -> DbResult<Option<Vec<Option<String>>>> {
        let Some(stmt) = self.dialect().column_types_sql(table) else {
            return Ok(None);
        };
        let frame = self.engine.query(&stmt.sql, &stmt.params).await?;
        let declared: HashMap<String, String> = frame
            .rows()
            .iter()
            .filter_map(|r| match (r.first()?.as_str(), r.get(1)?.as_str()) {
                (Some(name), Some(ty)) => Some((name.to_ascii_lowercase(), ty.to_string())),
                _ => None,
            })
            .collect();
        Ok(Some(
            columns
                .iter()
                .map(|c| declared.get(&c.to_ascii_lowercase()).cloned())
                .collect(),
        ))
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Insert every row of `frame` into `table`, creating the table from
    /// the frame's column kinds if it does not exist.
    pub async fn append_frame(&self, frame: &Frame, table: &str) -> DbResult<u64> {
        let columns: Vec<&str> = frame.columns().iter().map(String::as_str).collect();
        if columns.is_empty() {
            return Ok(0);
        }

        if !self.has_table(table).await? {
            let sql = self.dialect().create_table_sql(table, &columns, &frame.kinds());
            tracing::info!(table, "creating table");
            self.engine.execute(&sql, &[]).await?;
        }
        if frame.is_empty() {
            return Ok(0);
        }

        let types = self.column_types(table, frame.columns()).await?;
        let mut tx = self.engine.begin().await?;
        let result = insert_rows(
            tx.as_mut(),
            self.dialect(),
            table,
            &columns,
            frame.rows(),
            types.as_deref(),
        )
        .await;
        finish(tx, result).await
    }

    /// Empty `table`, then append `frame`.
    pub async fn replace_frame(&self, frame: &Frame, table: &str) -> DbResult<u64> {
        self.engine
            .execute(&self.dialect().truncate_sql(table), &[])
            .await?;
        self.append_frame(frame, table).await
    }

    /// Insert new rows and update (or keep) existing ones.
    ///
    /// Rows are staged in a temporary table shaped like `table`, then merged
    /// with the dialect's upsert statement, all in one transaction.
    pub async fn upsert_frame(
        &self,
        frame: &Frame,
        table: &str,
        options: &UpsertOptions,
    ) -> DbResult<u64> {
        let keys = match &options.match_columns {
            Some(cols) if !cols.is_empty() => cols.clone(),
            _ => {
                let pk = self.primary_key(table).await?;
                if pk.is_empty() {
                    return Err(DbError::NoMatchColumns(table.to_string()));
                }
                pk
            }
        };
        for key in &keys {
            if frame.column_index(key).is_none() {
                return Err(DbError::missing_column(key, format!("frame for '{}'", table)));
            }
        }
        if frame.is_empty() {
            return Ok(0);
        }

        let dialect = self.dialect();
        let columns: Vec<&str> = frame.columns().iter().map(String::as_str).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        let types = self.column_types(table, frame.columns()).await?;

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let temp = dialect.temp_table_name(&format!("upsert_{}", &suffix[..8]));
        tracing::debug!(table, temp = %temp, keys = ?keys, rows = frame.len(), "upserting");

        let mut tx = self.engine.begin().await?;
        let result = async {
            let tx = tx.as_mut();
            tx.execute(&dialect.create_temp_like_sql(&temp, table), &[])
                .await?;
            insert_rows(tx, dialect, &temp, &columns, frame.rows(), types.as_deref()).await?;
            let merged = tx
                .execute(
                    &dialect.merge_sql(table, &temp, &columns, &keys, options.on_conflict),
                    &[],
                )
                .await?;
            if let Some(drop) = dialect.drop_temp_sql(&temp) {
                tx.execute(&drop, &[]).await?;
            }
            Ok::<_, DbError>(merged)
        }
        .await;
        finish(tx, result).await
    }
}

/// Multi-row inserts, sized to the dialect's parameter budget.
async fn insert_rows(
    tx: &mut dyn Transaction,
    dialect: &dyn SqlDialect,
    table: &str,
    columns: &[&str],
    rows: &[Vec<Value>],
    types: Option<&[Option<String>]>,
) -> DbResult<u64> {
    let mut inserted = 0;
    for chunk in rows.chunks(dialect.rows_per_insert(columns.len())) {
        let stmt = dialect.insert_sql(table, columns, chunk, types);
        inserted += tx.execute(&stmt.sql, &stmt.params).await?;
    }
    Ok(inserted)
}

/// Commit on success; roll back and return the write error otherwise.
async fn finish(tx: Box<dyn Transaction>, result: DbResult<u64>) -> DbResult<u64> {
    match result {
        Ok(n) => {
            tx.commit().await?;
            Ok(n)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!("rollback failed: {}", rollback);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_options() {
        let opts = UpsertOptions::matching(["utln"]).ignore_conflicts();
        assert_eq!(opts.match_columns, Some(vec!["utln".to_string()]));
        assert_eq!(opts.on_conflict, OnConflict::Ignore);
        assert_eq!(UpsertOptions::default().on_conflict, OnConflict::Update);
    }
}
