//! Table to CSV export.

use crate::connect::ConnectionSpec;
use crate::error::DbResult;
use crate::interface::Database;

use std::path::Path;

/// Write every row of `table` to `out_csv` with a header row. Returns the
/// number of rows written.
pub async fn dump_table(db: &Database, table: &str, out_csv: impl AsRef<Path>) -> DbResult<usize> {
    let columns = db.columns(table).await?;
    let cols: Vec<&str> = columns.iter().map(String::as_str).collect();
    let frame = db
        .read_frame(table, (!cols.is_empty()).then_some(cols.as_slice()))
        .await?;

    let out_csv = out_csv.as_ref();
    frame.write_csv(out_csv)?;
    tracing::info!(table, rows = frame.len(), path = %out_csv.display(), "dumped table");
    Ok(frame.len())
}

/// [`dump_table`] with the connection taken from the `RT_DB_*` environment.
pub async fn dump_from_env(table: &str, out_csv: impl AsRef<Path>) -> DbResult<usize> {
    dump_from_lookup(table, out_csv, |key| std::env::var(key).ok()).await
}

/// [`dump_from_env`] reading the `RT_DB_*` variables from `lookup`.
pub async fn dump_from_lookup(
    table: &str,
    out_csv: impl AsRef<Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> DbResult<usize> {
    let spec = ConnectionSpec::from_lookup(lookup)?;
    let db = Database::connect(&spec).await?;
    let result = dump_table(&db, table, out_csv).await;
    db.close().await;
    result
}
