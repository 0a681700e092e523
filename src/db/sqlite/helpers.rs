//! Shared helper functions for SQLite repositories.

use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{Row, SqlitePool, Transaction};

use crate::db::{DbError, Entry, Id, Tag, Video};

/// Start a transaction that holds the write lock from its first statement.
///
/// A deferred transaction that reads before writing cannot upgrade its lock
/// while another connection writes, and SQLite fails it with SQLITE_BUSY
/// without waiting on the busy timeout.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, DbError> {
    pool.begin_with("BEGIN IMMEDIATE")
        .await
        .map_err(map_sqlx_error)
}

/// Map a driver error into a storage-agnostic error.
pub fn map_sqlx_error(e: sqlx::Error) -> DbError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => DbError::Constraint {
            message: db.message().to_string(),
        },
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => DbError::Constraint {
            message: db.message().to_string(),
        },
        _ => DbError::Database {
            message: e.to_string(),
        },
    }
}

/// Like [`map_sqlx_error`] but reports unique violations as `AlreadyExists`.
pub fn map_unique_error(entity_type: &str, id: &str) -> impl FnOnce(sqlx::Error) -> DbError {
    let entity_type = entity_type.to_string();
    let id = id.to_string();
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DbError::AlreadyExists { entity_type, id }
        }
        _ => map_sqlx_error(e),
    }
}

/// Reject blank required text fields.
pub fn require_text(field: &str, value: &str) -> Result<(), DbError> {
    if value.trim().is_empty() {
        return Err(DbError::Validation {
            message: format!("{} cannot be empty", field),
        });
    }
    Ok(())
}

pub fn entry_from_row(row: &SqliteRow, tag_ids: Vec<Id>) -> Entry {
    Entry {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        tag_ids,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub fn tag_from_row(row: &SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}

pub fn video_from_row(row: &SqliteRow) -> Video {
    Video {
        name: row.get("name"),
        path: row.get("path"),
        year: row.get("year"),
        mime_type: row.get("mime_type"),
        created_at: row.get("created_at"),
    }
}
