//! `DbWriter` batching over in-memory SQLite.
//!
//! Run: `cargo test --test writer`

mod common;

use async_trait::async_trait;
use common::{STAFF_TABLE, seeded};
use dbi::prelude::*;
use dbi::writer::DEFAULT_BATCH_SIZE;
use pretty_assertions::assert_eq;

struct StaffRecord {
    utln: String,
    email: String,
    state: RecordState,
}

impl Record for StaffRecord {
    fn table_name(&self) -> &str {
        "rt_staff"
    }

    fn key_columns(&self) -> &[&str] {
        &["utln"]
    }

    fn to_row(&self) -> Vec<(&str, Value)> {
        vec![
            ("utln", self.utln.as_str().into()),
            ("email", self.email.as_str().into()),
        ]
    }

    fn state(&self) -> RecordState {
        self.state
    }
}

/// `(utln, email)` pairs; existing UTLNs are updated in place.
struct StaffWriter;

#[async_trait]
impl RecordWriter for StaffWriter {
    type Input = (String, String);

    async fn transform(
        &self,
        row: &Self::Input,
        session: &mut Session,
    ) -> DbResult<Box<dyn Record>> {
        let (utln, email) = row;
        if !email.contains('@') {
            return Err(DbError::Decode(format!("bad email for {}: {}", utln, email)));
        }
        let existing = session
            .query("SELECT COUNT(*) FROM rt_staff WHERE utln = ?", &[utln.as_str().into()])
            .await?;
        let state = match existing.scalar().and_then(Value::as_i64) {
            Some(n) if n > 0 => RecordState::Persistent,
            _ => RecordState::New,
        };
        Ok(Box::new(StaffRecord {
            utln: utln.clone(),
            email: email.to_lowercase(),
            state,
        }))
    }
}

fn rows(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(u, e)| (u.to_string(), e.to_string()))
        .collect()
}

async fn writer() -> DbResult<DbWriter<StaffWriter>> {
    let db = seeded(&[
        STAFF_TABLE,
        "INSERT INTO rt_staff (utln, email) VALUES ('jdoe01', 'old@tufts.edu')",
    ])
    .await?;
    Ok(DbWriter::with_database(db, StaffWriter))
}

#[tokio::test]
async fn test_persist_inserts_and_updates() -> DbResult<()> {
    let writer = writer().await?;
    let input = rows(&[
        ("jdoe01", "Jane@Tufts.edu"),
        ("bsmit02", "bob@tufts.edu"),
        ("cwu03", "carol@tufts.edu"),
    ]);

    let written = writer.persist(&input, 2).await?;
    assert_eq!(written, 3);

    let stored = writer
        .database()
        .fetch("SELECT utln, email FROM rt_staff ORDER BY utln", &[])
        .await?;
    assert_eq!(
        stored,
        vec![
            vec![Value::from("bsmit02"), Value::from("bob@tufts.edu")],
            vec![Value::from("cwu03"), Value::from("carol@tufts.edu")],
            vec![Value::from("jdoe01"), Value::from("jane@tufts.edu")],
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_failed_batch_keeps_earlier_batches() -> DbResult<()> {
    let writer = writer().await?;
    let input = rows(&[
        ("bsmit02", "bob@tufts.edu"),
        ("cwu03", "carol@tufts.edu"),
        ("dlee04", "dan@tufts.edu"),
        ("ekim05", "not-an-email"),
    ]);

    let err = writer.persist(&input, 2).await.unwrap_err();
    assert!(err.to_string().contains("ekim05"));

    let db = writer.database();
    assert_eq!(db.record_count("rt_staff").await?, 3);
    let dan = db
        .fetch_one("SELECT utln FROM rt_staff WHERE utln = 'dlee04'", &[])
        .await?;
    assert_eq!(dan, None);
    Ok(())
}

#[tokio::test]
async fn test_zero_batch_size_still_writes() -> DbResult<()> {
    let writer = writer().await?;
    let written = writer.persist(&rows(&[("bsmit02", "bob@tufts.edu")]), 0).await?;
    assert_eq!(written, 1);
    Ok(())
}

fn numbered(count: usize) -> Vec<(String, String)> {
    (0..count)
        .map(|i| (format!("u{:03}", i), format!("u{:03}@tufts.edu", i)))
        .collect()
}

#[tokio::test]
async fn test_persist_all_uses_default_batches() -> DbResult<()> {
    let writer = writer().await?;
    let input = numbered(DEFAULT_BATCH_SIZE + 1);

    assert_eq!(writer.persist_all(&input).await?, 51);
    assert_eq!(writer.database().record_count("rt_staff").await?, 52);
    Ok(())
}

#[tokio::test]
async fn test_persist_all_commits_full_batches_before_a_failure() -> DbResult<()> {
    let writer = writer().await?;
    let mut input = numbered(DEFAULT_BATCH_SIZE);
    input.push(("bad01".to_string(), "no-at-sign".to_string()));

    let err = writer.persist_all(&input).await.unwrap_err();
    assert!(err.to_string().contains("bad01"));
    // The first 50 rows were their own batch; the 51st was rolled back alone.
    assert_eq!(writer.database().record_count("rt_staff").await?, 1 + 50);
    Ok(())
}
