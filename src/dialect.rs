//! SQL dialects.
//!
//! Vendor-specific SQL generation for the statements dbi issues itself:
//! - Identifier quoting and placeholders
//! - Catalog queries (table existence, columns, primary keys)
//! - Bulk `INSERT ... VALUES` batches
//! - Upsert strategies (ON CONFLICT, ON DUPLICATE KEY, MERGE)

use crate::flavor::Flavor;
use crate::value::{Value, ValueKind};

/// Rows per `INSERT ... VALUES` statement, whatever the parameter budget.
pub const MAX_ROWS_PER_INSERT: usize = 1000;

/// SQL text plus the values bound to its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }
}

/// What an upsert does with rows whose key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnConflict {
    /// Overwrite the non-key columns (`DO UPDATE`).
    #[default]
    Update,
    /// Keep the existing row (`DO NOTHING`).
    Ignore,
}

/// Split `schema.table` into its parts.
pub fn split_table(table: &str) -> (Option<&str>, &str) {
    match table.rsplit_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, table),
    }
}

/// SQL dialect for vendor-specific SQL generation
pub trait SqlDialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Quote a single identifier.
    fn quote_identifier(&self, name: &str) -> String;

    /// Placeholder for the `index`-th (1-based) bound parameter.
    fn placeholder(&self, index: usize) -> String;

    /// Most parameters one statement may carry.
    fn max_params(&self) -> usize;

    /// Count of tables named `table` in the current database/schema.
    fn table_exists_sql(&self, table: &str, database: &str) -> Statement;

    /// Column names in ordinal order.
    fn list_columns_sql(&self, table: &str, database: &str) -> Statement;

    /// Primary key column names in key order.
    fn primary_key_sql(&self, table: &str, database: &str) -> Statement;

    /// `(column, declared type)` pairs, for dialects that need typed placeholders.
    fn column_types_sql(&self, _table: &str) -> Option<Statement> {
        None
    }

    /// Wrap a placeholder so the server sees the column's type.
    fn typed_placeholder(&self, placeholder: String, _column_type: Option<&str>) -> String {
        placeholder
    }

    /// Column type used when creating a table from a frame.
    fn native_type(&self, kind: Option<ValueKind>) -> &'static str;

    fn truncate_sql(&self, table: &str) -> String {
        format!("TRUNCATE TABLE {}", self.quote_path(table))
    }

    /// Name for a scratch table derived from `base`.
    fn temp_table_name(&self, base: &str) -> String {
        base.to_string()
    }

    /// Create an empty temporary table shaped like `target`.
    fn create_temp_like_sql(&self, temp: &str, target: &str) -> String;

    /// Drop the temporary table, unless the dialect drops it at commit.
    fn drop_temp_sql(&self, temp: &str) -> Option<String> {
        Some(format!("DROP TABLE {}", self.quote_identifier(temp)))
    }

    /// Move rows from `temp` into `target`, resolving key conflicts.
    fn merge_sql(
        &self,
        target: &str,
        temp: &str,
        columns: &[&str],
        keys: &[&str],
        on_conflict: OnConflict,
    ) -> String;

    /// `COALESCE(MAX(col), now)` as a single-cell query.
    fn last_date_sql(&self, table: &str, date_col: &str) -> String;

    /// Quote a possibly schema-qualified name part by part.
    fn quote_path(&self, name: &str) -> String {
        name.split('.')
            .map(|part| self.quote_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn quote_list(&self, columns: &[&str]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn select_sql(&self, table: &str, columns: Option<&[&str]>) -> String {
        let cols = match columns {
            Some(cols) if !cols.is_empty() => self.quote_list(cols),
            _ => "*".to_string(),
        };
        format!("SELECT {} FROM {}", cols, self.quote_path(table))
    }

    fn count_sql(&self, table: &str) -> String {
        format!("SELECT COALESCE(COUNT(*), 0) FROM {}", self.quote_path(table))
    }

    fn create_table_sql(&self, table: &str, columns: &[&str], kinds: &[Option<ValueKind>]) -> String {
        let defs: Vec<String> = columns
            .iter()
            .zip(kinds)
            .map(|(c, k)| format!("{} {}", self.quote_identifier(c), self.native_type(*k)))
            .collect();
        format!("CREATE TABLE {} ({})", self.quote_path(table), defs.join(", "))
    }

    /// Rows per insert statement for `width` columns.
    fn rows_per_insert(&self, width: usize) -> usize {
        (self.max_params() / width.max(1)).clamp(1, MAX_ROWS_PER_INSERT)
    }

    /// Multi-row `INSERT ... VALUES`. Nulls are written inline so no
    /// parameter ever has to carry an untyped null.
    fn insert_sql(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<Value>],
        column_types: Option<&[Option<String>]>,
    ) -> Statement {
        let mut params = Vec::new();
        let tuples: Vec<String> = rows
            .iter()
            .map(|row| {
                let cells: Vec<String> = row
                    .iter()
                    .enumerate()
                    .map(|(i, value)| {
                        if value.is_null() {
                            return "NULL".to_string();
                        }
                        params.push(value.clone());
                        let ty = column_types.and_then(|t| t.get(i)).and_then(|t| t.as_deref());
                        self.typed_placeholder(self.placeholder(params.len()), ty)
                    })
                    .collect();
                format!("({})", cells.join(", "))
            })
            .collect();

        Statement::new(
            format!(
                "INSERT INTO {} ({}) VALUES {}",
                self.quote_path(table),
                self.quote_list(columns),
                tuples.join(", ")
            ),
            params,
        )
    }

    /// `UPDATE` one row identified by its `keys` columns. Every other
    /// column of `row` is assigned.
    fn update_sql(
        &self,
        table: &str,
        columns: &[&str],
        row: &[Value],
        keys: &[&str],
        column_types: Option<&[Option<String>]>,
    ) -> Statement {
        let mut params = Vec::new();
        let assign = |i: usize, params: &mut Vec<Value>| -> String {
            if row[i].is_null() {
                return "NULL".to_string();
            }
            params.push(row[i].clone());
            let ty = column_types.and_then(|t| t.get(i)).and_then(|t| t.as_deref());
            self.typed_placeholder(self.placeholder(params.len()), ty)
        };
        let is_key = |c: &str| keys.iter().any(|k| k.eq_ignore_ascii_case(c));

        let sets: Vec<String> = (0..columns.len())
            .filter(|&i| !is_key(columns[i]))
            .map(|i| format!("{} = {}", self.quote_identifier(columns[i]), assign(i, &mut params)))
            .collect();
        let conds: Vec<String> = (0..columns.len())
            .filter(|&i| is_key(columns[i]))
            .map(|i| {
                let q = self.quote_identifier(columns[i]);
                match assign(i, &mut params).as_str() {
                    "NULL" => format!("{} IS NULL", q),
                    p => format!("{} = {}", q, p),
                }
            })
            .collect();

        Statement::new(
            format!(
                "UPDATE {} SET {} WHERE {}",
                self.quote_path(table),
                sets.join(", "),
                conds.join(" AND ")
            ),
            params,
        )
    }
}

/// Dialect for a flavor.
pub fn dialect_for(flavor: Flavor) -> &'static dyn SqlDialect {
    match flavor {
        Flavor::Postgres => &PostgresDialect,
        Flavor::MySql => &MySqlDialect,
        Flavor::MsSql => &MsSqlDialect,
        Flavor::Sqlite => &SqliteDialect,
    }
}

fn schema_filter(
    dialect: &dyn SqlDialect,
    column: &str,
    schema: Option<&str>,
    default_expr: &str,
    params: &mut Vec<Value>,
) -> String {
    match schema {
        Some(s) => {
            params.push(Value::from(s));
            format!("{} = {}", column, dialect.placeholder(params.len()))
        }
        None => format!("{} = {}", column, default_expr),
    }
}

fn name_filter(dialect: &dyn SqlDialect, column: &str, name: &str, params: &mut Vec<Value>) -> String {
    params.push(Value::from(name));
    format!("{} = {}", column, dialect.placeholder(params.len()))
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    fn attributes_sql(&self, table: &str, extra: &str) -> Statement {
        Statement::new(
            format!(
                "SELECT CAST(a.attname AS TEXT) AS column_name{} FROM pg_attribute a \
                 WHERE a.attrelid = CAST($1 AS regclass) AND a.attnum > 0 AND NOT a.attisdropped \
                 ORDER BY a.attnum",
                extra
            ),
            vec![Value::from(self.quote_path(table))],
        )
    }
}

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn max_params(&self) -> usize {
        65_535
    }

    fn table_exists_sql(&self, table: &str, _database: &str) -> Statement {
        let (schema, name) = split_table(table);
        let mut params = Vec::new();
        let schema_cond = schema_filter(self, "table_schema", schema, "current_schema()", &mut params);
        let name_cond = name_filter(self, "table_name", name, &mut params);
        Statement::new(
            format!(
                "SELECT COUNT(*) FROM information_schema.tables WHERE {} AND {}",
                schema_cond, name_cond
            ),
            params,
        )
    }

    fn list_columns_sql(&self, table: &str, _database: &str) -> Statement {
        self.attributes_sql(table, "")
    }

    fn primary_key_sql(&self, table: &str, _database: &str) -> Statement {
        Statement::new(
            "SELECT CAST(a.attname AS TEXT) AS column_name FROM pg_index i \
             JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
             WHERE i.indrelid = CAST($1 AS regclass) AND i.indisprimary \
             ORDER BY array_position(CAST(i.indkey AS int2[]), a.attnum)",
            vec![Value::from(self.quote_path(table))],
        )
    }

    fn column_types_sql(&self, table: &str) -> Option<Statement> {
        Some(self.attributes_sql(
            table,
            ", format_type(a.atttypid, a.atttypmod) AS column_type",
        ))
    }

    fn typed_placeholder(&self, placeholder: String, column_type: Option<&str>) -> String {
        match column_type {
            Some(ty) => format!("CAST({} AS {})", placeholder, ty),
            None => placeholder,
        }
    }

    fn native_type(&self, kind: Option<ValueKind>) -> &'static str {
        match kind {
            Some(ValueKind::Bool) => "BOOLEAN",
            Some(ValueKind::Int) => "BIGINT",
            Some(ValueKind::Float) => "DOUBLE PRECISION",
            Some(ValueKind::Bytes) => "BYTEA",
            Some(ValueKind::Decimal) => "NUMERIC",
            Some(ValueKind::Date) => "DATE",
            Some(ValueKind::Time) => "TIME",
            Some(ValueKind::Timestamp) => "TIMESTAMP",
            Some(ValueKind::Text) | None => "TEXT",
        }
    }

    fn create_temp_like_sql(&self, temp: &str, target: &str) -> String {
        format!(
            "CREATE TEMPORARY TABLE {} (LIKE {} INCLUDING DEFAULTS) ON COMMIT DROP",
            self.quote_identifier(temp),
            self.quote_path(target)
        )
    }

    fn drop_temp_sql(&self, _temp: &str) -> Option<String> {
        None
    }

    fn merge_sql(
        &self,
        target: &str,
        temp: &str,
        columns: &[&str],
        keys: &[&str],
        on_conflict: OnConflict,
    ) -> String {
        on_conflict_merge(self, target, temp, columns, keys, on_conflict)
    }

    fn last_date_sql(&self, table: &str, date_col: &str) -> String {
        format!(
            "SELECT CAST(COALESCE(MAX({}), NOW()) AS TIMESTAMP) FROM {}",
            self.quote_identifier(date_col),
            self.quote_path(table)
        )
    }
}

/// `INSERT ... SELECT ... ON CONFLICT`, shared by PostgreSQL and SQLite.
/// The `WHERE true` keeps SQLite from reading `ON` as a join clause.
fn on_conflict_merge(
    dialect: &dyn SqlDialect,
    target: &str,
    temp: &str,
    columns: &[&str],
    keys: &[&str],
    on_conflict: OnConflict,
) -> String {
    let cols = dialect.quote_list(columns);
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !keys.iter().any(|k| k.eq_ignore_ascii_case(c)))
        .map(|c| {
            let q = dialect.quote_identifier(c);
            format!("{} = EXCLUDED.{}", q, q)
        })
        .collect();

    let action = if on_conflict == OnConflict::Ignore || updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    format!(
        "INSERT INTO {} ({}) SELECT {} FROM {} WHERE true ON CONFLICT ({}) {}",
        dialect.quote_path(target),
        cols,
        cols,
        dialect.quote_identifier(temp),
        dialect.quote_list(keys),
        action
    )
}

// ---------------------------------------------------------------------------
// MySQL
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    fn schema_table(&self, table: &str, database: &str) -> (Vec<Value>, String) {
        let (schema, name) = split_table(table);
        let params = vec![Value::from(schema.unwrap_or(database)), Value::from(name)];
        (params, "TABLE_SCHEMA = ? AND TABLE_NAME = ?".to_string())
    }
}

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "MySQL"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn max_params(&self) -> usize {
        65_535
    }

    fn table_exists_sql(&self, table: &str, database: &str) -> Statement {
        let (params, cond) = self.schema_table(table, database);
        Statement::new(
            format!("SELECT COUNT(*) FROM information_schema.TABLES WHERE {}", cond),
            params,
        )
    }

    fn list_columns_sql(&self, table: &str, database: &str) -> Statement {
        let (params, cond) = self.schema_table(table, database);
        Statement::new(
            format!(
                "SELECT COLUMN_NAME AS column_name FROM information_schema.COLUMNS WHERE {} \
                 ORDER BY ORDINAL_POSITION",
                cond
            ),
            params,
        )
    }

    fn primary_key_sql(&self, table: &str, database: &str) -> Statement {
        let (params, cond) = self.schema_table(table, database);
        Statement::new(
            format!(
                "SELECT COLUMN_NAME AS column_name FROM information_schema.KEY_COLUMN_USAGE WHERE {} \
                 AND CONSTRAINT_NAME = 'PRIMARY' ORDER BY ORDINAL_POSITION",
                cond
            ),
            params,
        )
    }

    fn native_type(&self, kind: Option<ValueKind>) -> &'static str {
        match kind {
            Some(ValueKind::Bool) => "BOOLEAN",
            Some(ValueKind::Int) => "BIGINT",
            Some(ValueKind::Float) => "DOUBLE",
            Some(ValueKind::Bytes) => "LONGBLOB",
            Some(ValueKind::Decimal) => "DECIMAL(38, 10)",
            Some(ValueKind::Date) => "DATE",
            Some(ValueKind::Time) => "TIME",
            Some(ValueKind::Timestamp) => "DATETIME(6)",
            Some(ValueKind::Text) | None => "TEXT",
        }
    }

    fn create_temp_like_sql(&self, temp: &str, target: &str) -> String {
        format!(
            "CREATE TEMPORARY TABLE {} LIKE {}",
            self.quote_identifier(temp),
            self.quote_path(target)
        )
    }

    fn drop_temp_sql(&self, temp: &str) -> Option<String> {
        Some(format!("DROP TEMPORARY TABLE {}", self.quote_identifier(temp)))
    }

    /// MySQL resolves conflicts against every unique index of the target;
    /// `keys` only decide which columns are left alone on update.
    fn merge_sql(
        &self,
        target: &str,
        temp: &str,
        columns: &[&str],
        keys: &[&str],
        on_conflict: OnConflict,
    ) -> String {
        let cols = self.quote_list(columns);
        let updates: Vec<String> = columns
            .iter()
            .filter(|c| !keys.iter().any(|k| k.eq_ignore_ascii_case(c)))
            .map(|c| {
                let q = self.quote_identifier(c);
                format!("{} = src.{}", q, q)
            })
            .collect();

        if on_conflict == OnConflict::Ignore || updates.is_empty() {
            return format!(
                "INSERT IGNORE INTO {} ({}) SELECT {} FROM {}",
                self.quote_path(target),
                cols,
                cols,
                self.quote_identifier(temp)
            );
        }

        let src_cols: Vec<String> = columns
            .iter()
            .map(|c| format!("src.{}", self.quote_identifier(c)))
            .collect();
        format!(
            "INSERT INTO {} ({}) SELECT {} FROM {} AS src ON DUPLICATE KEY UPDATE {}",
            self.quote_path(target),
            cols,
            src_cols.join(", "),
            self.quote_identifier(temp),
            updates.join(", ")
        )
    }

    fn last_date_sql(&self, table: &str, date_col: &str) -> String {
        format!(
            "SELECT CAST(COALESCE(MAX({}), NOW()) AS DATETIME) FROM {}",
            self.quote_identifier(date_col),
            self.quote_path(table)
        )
    }
}

// ---------------------------------------------------------------------------
// SQL Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct MsSqlDialect;

impl MsSqlDialect {
    fn catalog_sql(&self, select: &str, from: &str, table: &str, order: &str) -> Statement {
        let (schema, name) = split_table(table);
        let mut params = Vec::new();
        let schema_cond = schema_filter(self, "TABLE_SCHEMA", schema, "SCHEMA_NAME()", &mut params);
        let name_cond = name_filter(self, "TABLE_NAME", name, &mut params);
        Statement::new(
            format!(
                "SELECT {} FROM {} WHERE {} AND {}{}",
                select, from, schema_cond, name_cond, order
            ),
            params,
        )
    }
}

impl SqlDialect for MsSqlDialect {
    fn name(&self) -> &'static str {
        "SQL Server"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@P{}", index)
    }

    /// The server accepts 2100; leave room for the RPC's own arguments.
    fn max_params(&self) -> usize {
        2_000
    }

    fn table_exists_sql(&self, table: &str, _database: &str) -> Statement {
        self.catalog_sql("COUNT(*)", "INFORMATION_SCHEMA.TABLES", table, "")
    }

    fn list_columns_sql(&self, table: &str, _database: &str) -> Statement {
        self.catalog_sql(
            "COLUMN_NAME AS column_name",
            "INFORMATION_SCHEMA.COLUMNS",
            table,
            " ORDER BY ORDINAL_POSITION",
        )
    }

    fn primary_key_sql(&self, table: &str, _database: &str) -> Statement {
        let (schema, name) = split_table(table);
        let mut params = Vec::new();
        let schema_cond = schema_filter(self, "t.TABLE_SCHEMA", schema, "SCHEMA_NAME()", &mut params);
        let name_cond = name_filter(self, "t.TABLE_NAME", name, &mut params);
        Statement::new(
            format!(
                "SELECT k.COLUMN_NAME AS column_name FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS t \
                 JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE k ON k.CONSTRAINT_NAME = t.CONSTRAINT_NAME \
                 AND k.TABLE_SCHEMA = t.TABLE_SCHEMA AND k.TABLE_NAME = t.TABLE_NAME \
                 WHERE t.CONSTRAINT_TYPE = 'PRIMARY KEY' AND {} AND {} ORDER BY k.ORDINAL_POSITION",
                schema_cond, name_cond
            ),
            params,
        )
    }

    fn native_type(&self, kind: Option<ValueKind>) -> &'static str {
        match kind {
            Some(ValueKind::Bool) => "BIT",
            Some(ValueKind::Int) => "BIGINT",
            Some(ValueKind::Float) => "FLOAT",
            Some(ValueKind::Bytes) => "VARBINARY(MAX)",
            Some(ValueKind::Decimal) => "DECIMAL(38, 10)",
            Some(ValueKind::Date) => "DATE",
            Some(ValueKind::Time) => "TIME",
            Some(ValueKind::Timestamp) => "DATETIME2",
            Some(ValueKind::Text) | None => "NVARCHAR(MAX)",
        }
    }

    fn temp_table_name(&self, base: &str) -> String {
        format!("#{}", base)
    }

    fn create_temp_like_sql(&self, temp: &str, target: &str) -> String {
        format!(
            "SELECT TOP 0 * INTO {} FROM {}",
            self.quote_identifier(temp),
            self.quote_path(target)
        )
    }

    fn merge_sql(
        &self,
        target: &str,
        temp: &str,
        columns: &[&str],
        keys: &[&str],
        on_conflict: OnConflict,
    ) -> String {
        let join: Vec<String> = keys
            .iter()
            .map(|k| {
                let q = self.quote_identifier(k);
                format!("tgt.{} = src.{}", q, q)
            })
            .collect();
        let updates: Vec<String> = columns
            .iter()
            .filter(|c| !keys.iter().any(|k| k.eq_ignore_ascii_case(c)))
            .map(|c| {
                let q = self.quote_identifier(c);
                format!("tgt.{} = src.{}", q, q)
            })
            .collect();
        let src_cols: Vec<String> = columns
            .iter()
            .map(|c| format!("src.{}", self.quote_identifier(c)))
            .collect();

        let matched = if on_conflict == OnConflict::Ignore || updates.is_empty() {
            String::new()
        } else {
            format!(" WHEN MATCHED THEN UPDATE SET {}", updates.join(", "))
        };

        format!(
            "MERGE INTO {} AS tgt USING {} AS src ON ({}){} \
             WHEN NOT MATCHED THEN INSERT ({}) VALUES ({});",
            self.quote_path(target),
            self.quote_identifier(temp),
            join.join(" AND "),
            matched,
            self.quote_list(columns),
            src_cols.join(", ")
        )
    }

    fn last_date_sql(&self, table: &str, date_col: &str) -> String {
        format!(
            "SELECT CAST(COALESCE(MAX({}), SYSDATETIME()) AS DATETIME2) FROM {}",
            self.quote_identifier(date_col),
            self.quote_path(table)
        )
    }
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "SQLite"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn max_params(&self) -> usize {
        32_766
    }

    fn table_exists_sql(&self, table: &str, _database: &str) -> Statement {
        let (_, name) = split_table(table);
        Statement::new(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?",
            vec![Value::from(name)],
        )
    }

    fn list_columns_sql(&self, table: &str, _database: &str) -> Statement {
        let (_, name) = split_table(table);
        Statement::new(
            "SELECT name AS column_name FROM pragma_table_info(?) ORDER BY cid",
            vec![Value::from(name)],
        )
    }

    fn primary_key_sql(&self, table: &str, _database: &str) -> Statement {
        let (_, name) = split_table(table);
        Statement::new(
            "SELECT name AS column_name FROM pragma_table_info(?) WHERE pk > 0 ORDER BY pk",
            vec![Value::from(name)],
        )
    }

    fn native_type(&self, kind: Option<ValueKind>) -> &'static str {
        match kind {
            Some(ValueKind::Bool) => "BOOLEAN",
            Some(ValueKind::Int) => "INTEGER",
            Some(ValueKind::Float) => "REAL",
            Some(ValueKind::Bytes) => "BLOB",
            Some(ValueKind::Decimal) => "NUMERIC",
            Some(ValueKind::Date) => "DATE",
            Some(ValueKind::Time) => "TIME",
            Some(ValueKind::Timestamp) => "DATETIME",
            Some(ValueKind::Text) | None => "TEXT",
        }
    }

    fn truncate_sql(&self, table: &str) -> String {
        format!("DELETE FROM {}", self.quote_path(table))
    }

    fn create_temp_like_sql(&self, temp: &str, target: &str) -> String {
        format!(
            "CREATE TEMP TABLE {} AS SELECT * FROM {} WHERE 0",
            self.quote_identifier(temp),
            self.quote_path(target)
        )
    }

    fn merge_sql(
        &self,
        target: &str,
        temp: &str,
        columns: &[&str],
        keys: &[&str],
        on_conflict: OnConflict,
    ) -> String {
        on_conflict_merge(self, target, temp, columns, keys, on_conflict)
    }

    fn last_date_sql(&self, table: &str, date_col: &str) -> String {
        format!(
            "SELECT COALESCE(MAX({}), datetime('now')) FROM {}",
            self.quote_identifier(date_col),
            self.quote_path(table)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(PostgresDialect.quote_identifier("my\"table"), "\"my\"\"table\"");
        assert_eq!(MySqlDialect.quote_identifier("my`table"), "`my``table`");
        assert_eq!(MsSqlDialect.quote_identifier("a]b"), "[a]]b]");
        assert_eq!(MsSqlDialect.quote_path("dbo.staff"), "[dbo].[staff]");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(PostgresDialect.placeholder(10), "$10");
        assert_eq!(MySqlDialect.placeholder(3), "?");
        assert_eq!(MsSqlDialect.placeholder(2), "@P2");
    }

    #[test]
    fn test_select_and_count() {
        let d = dialect_for(Flavor::MySql);
        assert_eq!(d.select_sql("rt_staff", None), "SELECT * FROM `rt_staff`");
        assert_eq!(
            d.select_sql("rt_staff", Some(&["utln", "email"])),
            "SELECT `utln`, `email` FROM `rt_staff`"
        );
        assert_eq!(
            d.count_sql("rt_staff"),
            "SELECT COALESCE(COUNT(*), 0) FROM `rt_staff`"
        );
    }

    #[test]
    fn test_insert_sql_inlines_nulls() {
        let rows = vec![
            vec![Value::Int(1), Value::Null],
            vec![Value::Int(2), Value::from("x")],
        ];
        let stmt = PostgresDialect.insert_sql("t", &["id", "name"], &rows, None);
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"t\" (\"id\", \"name\") VALUES ($1, NULL), ($2, $3)"
        );
        assert_eq!(stmt.params, vec![Value::Int(1), Value::Int(2), Value::from("x")]);
    }

    #[test]
    fn test_update_sql() {
        let row = vec![Value::Int(7), Value::from("ada"), Value::Null];
        let stmt = PostgresDialect.update_sql("staff", &["id", "name", "title"], &row, &["id"], None);
        assert_eq!(
            stmt.sql,
            "UPDATE \"staff\" SET \"name\" = $1, \"title\" = NULL WHERE \"id\" = $2"
        );
        assert_eq!(stmt.params, vec![Value::from("ada"), Value::Int(7)]);

        let stmt = MsSqlDialect.update_sql("staff", &["id", "name", "title"], &row, &["id"], None);
        assert_eq!(
            stmt.sql,
            "UPDATE [staff] SET [name] = @P1, [title] = NULL WHERE [id] = @P2"
        );
    }

    #[test]
    fn test_postgres_insert_casts_to_column_type() {
        let rows = vec![vec![Value::from("2024-01-02")]];
        let types = vec![Some("date".to_string())];
        let stmt = PostgresDialect.insert_sql("t", &["day"], &rows, Some(&types));
        assert_eq!(stmt.sql, "INSERT INTO \"t\" (\"day\") VALUES (CAST($1 AS date))");

        // Other dialects ignore declared types.
        let stmt = MySqlDialect.insert_sql("t", &["day"], &rows, Some(&types));
        assert_eq!(stmt.sql, "INSERT INTO `t` (`day`) VALUES (?)");
    }

    #[test]
    fn test_rows_per_insert() {
        assert_eq!(MsSqlDialect.rows_per_insert(10), 200);
        assert_eq!(PostgresDialect.rows_per_insert(3), MAX_ROWS_PER_INSERT);
        assert_eq!(MsSqlDialect.rows_per_insert(5000), 1);
    }

    #[test]
    fn test_postgres_merge() {
        let sql = PostgresDialect.merge_sql(
            "rt_staff",
            "upsert_1",
            &["id", "name", "email"],
            &["id"],
            OnConflict::Update,
        );
        assert_eq!(
            sql,
            "INSERT INTO \"rt_staff\" (\"id\", \"name\", \"email\") SELECT \"id\", \"name\", \"email\" \
             FROM \"upsert_1\" WHERE true ON CONFLICT (\"id\") \
             DO UPDATE SET \"name\" = EXCLUDED.\"name\", \"email\" = EXCLUDED.\"email\""
        );
    }

    #[test]
    fn test_merge_without_update_columns_does_nothing() {
        let sql = SqliteDialect.merge_sql("t", "tmp", &["a", "b"], &["a", "b"], OnConflict::Update);
        assert!(sql.ends_with("ON CONFLICT (\"a\", \"b\") DO NOTHING"));

        let sql = PostgresDialect.merge_sql("t", "tmp", &["a", "b"], &["a"], OnConflict::Ignore);
        assert!(sql.ends_with("DO NOTHING"));
    }

    #[test]
    fn test_mysql_merge() {
        let sql = MySqlDialect.merge_sql("t", "tmp", &["id", "v"], &["id"], OnConflict::Update);
        assert_eq!(
            sql,
            "INSERT INTO `t` (`id`, `v`) SELECT src.`id`, src.`v` FROM `tmp` AS src \
             ON DUPLICATE KEY UPDATE `v` = src.`v`"
        );
        let sql = MySqlDialect.merge_sql("t", "tmp", &["id", "v"], &["id"], OnConflict::Ignore);
        assert_eq!(sql, "INSERT IGNORE INTO `t` (`id`, `v`) SELECT `id`, `v` FROM `tmp`");
    }

    #[test]
    fn test_mssql_merge() {
        let temp = MsSqlDialect.temp_table_name("upsert_1");
        assert_eq!(temp, "#upsert_1");
        let sql = MsSqlDialect.merge_sql("dbo.t", &temp, &["id", "v"], &["id"], OnConflict::Update);
        assert_eq!(
            sql,
            "MERGE INTO [dbo].[t] AS tgt USING [#upsert_1] AS src ON (tgt.[id] = src.[id]) \
             WHEN MATCHED THEN UPDATE SET tgt.[v] = src.[v] \
             WHEN NOT MATCHED THEN INSERT ([id], [v]) VALUES (src.[id], src.[v]);"
        );
    }

    #[test]
    fn test_temp_tables() {
        assert_eq!(
            PostgresDialect.create_temp_like_sql("tmp", "t"),
            "CREATE TEMPORARY TABLE \"tmp\" (LIKE \"t\" INCLUDING DEFAULTS) ON COMMIT DROP"
        );
        assert_eq!(PostgresDialect.drop_temp_sql("tmp"), None);
        assert_eq!(
            MySqlDialect.drop_temp_sql("tmp").as_deref(),
            Some("DROP TEMPORARY TABLE `tmp`")
        );
        assert_eq!(
            MsSqlDialect.create_temp_like_sql("#tmp", "t"),
            "SELECT TOP 0 * INTO [#tmp] FROM [t]"
        );
    }

    #[test]
    fn test_catalog_queries() {
        let stmt = MySqlDialect.table_exists_sql("rt_staff", "rt_analytics");
        assert_eq!(
            stmt.params,
            vec![Value::from("rt_analytics"), Value::from("rt_staff")]
        );

        let stmt = PostgresDialect.table_exists_sql("rt_staff", "rt_analytics");
        assert!(stmt.sql.contains("table_schema = current_schema()"));
        assert!(stmt.sql.contains("table_name = $1"));

        let stmt = MsSqlDialect.table_exists_sql("hr.rt_staff", "rt_analytics");
        assert!(stmt.sql.contains("TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2"));
        assert_eq!(stmt.params, vec![Value::from("hr"), Value::from("rt_staff")]);
    }

    #[test]
    fn test_truncate_and_last_date() {
        assert_eq!(SqliteDialect.truncate_sql("t"), "DELETE FROM \"t\"");
        assert_eq!(MySqlDialect.truncate_sql("t"), "TRUNCATE TABLE `t`");
        assert_eq!(
            MsSqlDialect.last_date_sql("t", "updated"),
            "SELECT CAST(COALESCE(MAX([updated]), SYSDATETIME()) AS DATETIME2) FROM [t]"
        );
    }

    #[test]
    fn test_create_table() {
        let sql = SqliteDialect.create_table_sql(
            "t",
            &["id", "name", "misc"],
            &[Some(ValueKind::Int), Some(ValueKind::Text), None],
        );
        assert_eq!(
            sql,
            "CREATE TABLE \"t\" (\"id\" INTEGER, \"name\" TEXT, \"misc\" TEXT)"
        );
    }
}
