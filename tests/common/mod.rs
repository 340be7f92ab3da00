//! Shared fixtures for the SQLite-backed integration tests.

#![allow(dead_code)]

use dbi::prelude::*;

/// A fresh in-memory database.
pub async fn memory_db() -> DbResult<Database> {
    Database::connect(&ConnectionSpec::sqlite_memory()).await
}

/// An in-memory database with `statements` already run.
pub async fn seeded(statements: &[&str]) -> DbResult<Database> {
    let db = memory_db().await?;
    for sql in statements {
        db.execute(sql, &[]).await?;
    }
    Ok(db)
}

pub const STAFF_TABLE: &str =
    "CREATE TABLE rt_staff (utln TEXT PRIMARY KEY, email TEXT, title TEXT)";
