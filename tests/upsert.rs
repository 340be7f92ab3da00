//! `Database::upsert_frame` through a staging table on in-memory SQLite.
//!
//! Run: `cargo test --test upsert`

mod common;

use common::{STAFF_TABLE, seeded};
use dbi::prelude::*;
use pretty_assertions::assert_eq;

async fn staff_db() -> DbResult<Database> {
    seeded(&[
        STAFF_TABLE,
        "INSERT INTO rt_staff VALUES ('jdoe01', 'old@tufts.edu', 'Analyst')",
    ])
    .await
}

fn incoming() -> Frame {
    Frame::from_rows(
        ["utln", "email", "title"],
        vec![
            vec!["jdoe01".into(), "jane@tufts.edu".into(), "Manager".into()],
            vec!["bsmit02".into(), "bob@tufts.edu".into(), Value::Null],
        ],
    )
    .unwrap()
}

async fn emails(db: &Database) -> DbResult<Vec<Vec<Value>>> {
    db.fetch("SELECT utln, email FROM rt_staff ORDER BY utln", &[])
        .await
}

#[tokio::test]
async fn test_upsert_by_primary_key() -> DbResult<()> {
    let db = staff_db().await?;

    let affected = db
        .upsert_frame(&incoming(), "rt_staff", &UpsertOptions::default())
        .await?;
    assert_eq!(affected, 2);
    assert_eq!(
        emails(&db).await?,
        vec![
            vec![Value::from("bsmit02"), Value::from("bob@tufts.edu")],
            vec![Value::from("jdoe01"), Value::from("jane@tufts.edu")],
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_upsert_ignore_conflicts_keeps_existing_rows() -> DbResult<()> {
    let db = staff_db().await?;

    db.upsert_frame(
        &incoming(),
        "rt_staff",
        &UpsertOptions::matching(["utln"]).ignore_conflicts(),
    )
    .await?;
    assert_eq!(
        emails(&db).await?,
        vec![
            vec![Value::from("bsmit02"), Value::from("bob@tufts.edu")],
            vec![Value::from("jdoe01"), Value::from("old@tufts.edu")],
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_upsert_twice_is_stable() -> DbResult<()> {
    let db = staff_db().await?;
    let options = UpsertOptions::default();

    db.upsert_frame(&incoming(), "rt_staff", &options).await?;
    db.upsert_frame(&incoming(), "rt_staff", &options).await?;
    assert_eq!(db.record_count("rt_staff").await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_upsert_without_keys_fails() -> DbResult<()> {
    let db = seeded(&["CREATE TABLE notes (body TEXT)"]).await?;
    let frame = Frame::from_rows(["body"], vec![vec!["hi".into()]])?;

    let err = db
        .upsert_frame(&frame, "notes", &UpsertOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NoMatchColumns(_)));
    assert_eq!(db.record_count("notes").await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_upsert_key_missing_from_frame() -> DbResult<()> {
    let db = staff_db().await?;
    let frame = Frame::from_rows(["email"], vec![vec!["x@tufts.edu".into()]])?;

    let err = db
        .upsert_frame(&frame, "rt_staff", &UpsertOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("utln"));
    assert!(err.is_client_side());
    Ok(())
}

#[tokio::test]
async fn test_failed_merge_rolls_back() -> DbResult<()> {
    let db = staff_db().await?;
    // No unique index on email, so ON CONFLICT (email) cannot resolve.
    let err = db
        .upsert_frame(&incoming(), "rt_staff", &UpsertOptions::matching(["email"]))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Execution(_)));
    assert_eq!(
        emails(&db).await?,
        vec![vec![Value::from("jdoe01"), Value::from("old@tufts.edu")]]
    );
    Ok(())
}
