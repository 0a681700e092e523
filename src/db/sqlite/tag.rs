//! SQLite TagRepository implementation.

use sqlx::SqlitePool;

use super::helpers::{begin_write, map_sqlx_error, map_unique_error, require_text, tag_from_row};
use crate::db::utils::current_timestamp;
use crate::db::{DbError, DbResult, Id, NewTag, Tag, TagPatch, TagRepository};
use crate::events::{ChangeSet, MutationBus};

/// SQLx-backed tag repository.
pub struct SqliteTagRepository<'a> {
    pub(crate) pool: &'a SqlitePool,
    pub(crate) changes: &'a MutationBus<ChangeSet>,
}

impl TagRepository for SqliteTagRepository<'_> {
    async fn create(&self, tag: &NewTag) -> DbResult<Tag> {
        require_text("name", &tag.name)?;

        let updated_at = current_timestamp();
        let created_at = tag.created_at.unwrap_or(updated_at);

        let id = sqlx::query(
            "INSERT INTO tag (name, description, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&tag.name)
        .bind(&tag.description)
        .bind(created_at)
        .bind(updated_at)
        .execute(self.pool)
        .await
        .map_err(map_unique_error("Tag", &tag.name))?
        .last_insert_rowid();

        self.changes.publish(&ChangeSet::tag(id)).await;

        Ok(Tag {
            id,
            name: tag.name.clone(),
            description: tag.description.clone(),
            created_at,
        })
    }

    async fn get(&self, id: Id) -> DbResult<Tag> {
        let row = sqlx::query("SELECT id, name, description, created_at FROM tag WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| DbError::not_found("Tag", id))?;

        Ok(tag_from_row(&row))
    }

    async fn get_by_name(&self, name: &str) -> DbResult<Option<Tag>> {
        let row = sqlx::query("SELECT id, name, description, created_at FROM tag WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.as_ref().map(tag_from_row))
    }

    async fn list(&self) -> DbResult<Vec<Tag>> {
        let rows = sqlx::query("SELECT id, name, description, created_at FROM tag ORDER BY name")
            .fetch_all(self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn created_between(&self, start: i64, end: i64) -> DbResult<Vec<Tag>> {
        let rows = sqlx::query(
            "SELECT id, name, description, created_at FROM tag \
             WHERE created_at >= ? AND created_at < ? ORDER BY created_at, id",
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn update(&self, id: Id, patch: &TagPatch) -> DbResult<Tag> {
        let mut tag = self.get(id).await?;

        if let Some(name) = &patch.name {
            require_text("name", name)?;
            tag.name = name.clone();
        }
        if let Some(description) = &patch.description {
            tag.description = Some(description.clone());
        }

        sqlx::query("UPDATE tag SET name = ?, description = ?, updated_at = ? WHERE id = ?")
            .bind(&tag.name)
            .bind(&tag.description)
            .bind(current_timestamp())
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(map_unique_error("Tag", &tag.name))?;

        self.changes.publish(&ChangeSet::tag(id)).await;
        Ok(tag)
    }

    async fn delete(&self, id: Id) -> DbResult<Tag> {
        let tag = self.get(id).await?;

        let mut tx = begin_write(self.pool).await?;

        let entry_ids: Vec<Id> =
            sqlx::query_scalar("SELECT entry_id FROM entry_tag WHERE tag_id = ?")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

        let result = sqlx::query("DELETE FROM tag WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tag", id));
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        // Entries that lost the tag changed too.
        self.changes
            .publish(&ChangeSet::tag(id).with_entries(entry_ids))
            .await;
        Ok(tag)
    }

    async fn count(&self) -> DbResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tag")
            .fetch_one(self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(total as u64)
    }
}
