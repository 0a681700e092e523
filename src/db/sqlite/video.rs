//! SQLite VideoRepository implementation.

use sqlx::SqlitePool;

use super::helpers::{map_sqlx_error, map_unique_error, require_text, video_from_row};
use crate::db::{DbError, DbResult, Video, VideoRepository};
use crate::events::{MutationBus, VideoChange};

/// SQLx-backed video repository.
pub struct SqliteVideoRepository<'a> {
    pub(crate) pool: &'a SqlitePool,
    pub(crate) changes: &'a MutationBus<VideoChange>,
}

impl VideoRepository for SqliteVideoRepository<'_> {
    async fn create(&self, video: &Video) -> DbResult<Video> {
        require_text("name", &video.name)?;

        sqlx::query(
            "INSERT INTO video (name, path, year, mime_type, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&video.name)
        .bind(&video.path)
        .bind(video.year)
        .bind(&video.mime_type)
        .bind(video.created_at)
        .execute(self.pool)
        .await
        .map_err(map_unique_error("Video", &video.name))?;

        self.changes.publish(&VideoChange::new(&video.name)).await;
        Ok(video.clone())
    }

    async fn get(&self, name: &str) -> DbResult<Video> {
        let row = sqlx::query(
            "SELECT name, path, year, mime_type, created_at FROM video WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| DbError::not_found("Video", name))?;

        Ok(video_from_row(&row))
    }

    async fn list(&self) -> DbResult<Vec<Video>> {
        let rows = sqlx::query(
            "SELECT name, path, year, mime_type, created_at FROM video ORDER BY created_at, name",
        )
        .fetch_all(self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(video_from_row).collect())
    }

    async fn count(&self) -> DbResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM video")
            .fetch_one(self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(total as u64)
    }
}
