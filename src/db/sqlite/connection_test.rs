//! Tests for SQLite database connection and migrations.

use crate::db::{Database, SqliteDatabase};

#[tokio::test(flavor = "multi_thread")]
async fn migrate_creates_all_tables() {
    let db = SqliteDatabase::in_memory()
        .await
        .expect("Failed to create in-memory database");

    db.migrate().await.expect("Migration should succeed");

    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .fetch_all(db.pool())
            .await
            .expect("Query should succeed");

    // _sqlx_migrations is created by sqlx for migration tracking.
    let expected = vec!["_sqlx_migrations", "entry", "entry_tag", "tag", "video"];

    for table in &expected {
        assert!(
            tables.iter().any(|t| t == table),
            "Missing table: {}. Found tables: {:?}",
            table,
            tables
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn migrate_is_idempotent() {
    let db = SqliteDatabase::in_memory()
        .await
        .expect("Failed to create in-memory database");

    db.migrate().await.expect("First migration should succeed");
    db.migrate().await.expect("Second migration should succeed");

    let counts = db.counts().await.expect("Counts should succeed");
    assert_eq!(counts.entries, 0);
    assert_eq!(counts.tags, 0);
    assert_eq!(counts.videos, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn open_creates_database_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("journal.db");

    let db = SqliteDatabase::open(&path).await.expect("Open should succeed");
    db.migrate().await.expect("Migration should succeed");

    assert!(path.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn foreign_keys_are_enforced() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    db.migrate().await.unwrap();

    let result = sqlx::query("INSERT INTO entry_tag (entry_id, tag_id, created_at) VALUES (1, 1, 0)")
        .execute(db.pool())
        .await;

    assert!(result.is_err(), "Dangling link should be rejected");
}
