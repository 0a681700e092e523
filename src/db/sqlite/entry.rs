//! SQLite EntryRepository implementation.

use std::collections::HashMap;

use sqlx::{Row, SqlitePool};

use super::helpers::{begin_write, entry_from_row, map_sqlx_error, require_text, tag_from_row};
use crate::db::utils::current_timestamp;
use crate::db::{DbError, DbResult, Entry, EntryPatch, EntryRepository, Id, NewEntry, Tag};
use crate::events::{ChangeSet, MutationBus};

const ENTRY_COLUMNS: &str = "id, title, content, created_at, updated_at";

/// SQLx-backed entry repository.
pub struct SqliteEntryRepository<'a> {
    pub(crate) pool: &'a SqlitePool,
    pub(crate) changes: &'a MutationBus<ChangeSet>,
}

impl SqliteEntryRepository<'_> {
    async fn tag_ids(&self, entry_id: Id) -> DbResult<Vec<Id>> {
        sqlx::query_scalar("SELECT tag_id FROM entry_tag WHERE entry_id = ? ORDER BY tag_id")
            .bind(entry_id)
            .fetch_all(self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    /// Load links for many entries at once, keyed by entry ID.
    async fn tag_ids_by_entry(&self) -> DbResult<HashMap<Id, Vec<Id>>> {
        let rows = sqlx::query("SELECT entry_id, tag_id FROM entry_tag ORDER BY entry_id, tag_id")
            .fetch_all(self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let mut links: HashMap<Id, Vec<Id>> = HashMap::new();
        for row in rows {
            links
                .entry(row.get("entry_id"))
                .or_default()
                .push(row.get("tag_id"));
        }
        Ok(links)
    }

    async fn hydrate(&self, sql: &str, binds: &[i64]) -> DbResult<Vec<Entry>> {
        let mut query = sqlx::query(sql);
        for value in binds {
            query = query.bind(*value);
        }
        let rows = query.fetch_all(self.pool).await.map_err(map_sqlx_error)?;

        let mut links = self.tag_ids_by_entry().await?;
        Ok(rows
            .iter()
            .map(|row| {
                let id: Id = row.get("id");
                entry_from_row(row, links.remove(&id).unwrap_or_default())
            })
            .collect())
    }
}

impl EntryRepository for SqliteEntryRepository<'_> {
    async fn create(&self, entry: &NewEntry) -> DbResult<Entry> {
        require_text("title", &entry.title)?;

        let updated_at = current_timestamp();
        let created_at = entry.created_at.unwrap_or(updated_at);

        let id = sqlx::query(
            "INSERT INTO entry (title, content, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&entry.title)
        .bind(&entry.content)
        .bind(created_at)
        .bind(updated_at)
        .execute(self.pool)
        .await
        .map_err(map_sqlx_error)?
        .last_insert_rowid();

        self.changes.publish(&ChangeSet::entry(id)).await;

        Ok(Entry {
            id,
            title: entry.title.clone(),
            content: entry.content.clone(),
            tag_ids: vec![],
            created_at,
            updated_at,
        })
    }

    async fn get(&self, id: Id) -> DbResult<Entry> {
        let row = sqlx::query(&format!("SELECT {} FROM entry WHERE id = ?", ENTRY_COLUMNS))
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| DbError::not_found("Entry", id))?;

        let tag_ids = self.tag_ids(id).await?;
        Ok(entry_from_row(&row, tag_ids))
    }

    async fn list(&self) -> DbResult<Vec<Entry>> {
        self.hydrate(
            &format!("SELECT {} FROM entry ORDER BY created_at, id", ENTRY_COLUMNS),
            &[],
        )
        .await
    }

    async fn created_between(&self, start: i64, end: i64) -> DbResult<Vec<Entry>> {
        self.hydrate(
            &format!(
                "SELECT {} FROM entry WHERE created_at >= ? AND created_at < ? ORDER BY created_at, id",
                ENTRY_COLUMNS
            ),
            &[start, end],
        )
        .await
    }

    async fn update(&self, id: Id, patch: &EntryPatch) -> DbResult<Entry> {
        let mut entry = self.get(id).await?;

        if let Some(title) = &patch.title {
            require_text("title", title)?;
            entry.title = title.clone();
        }
        if let Some(content) = &patch.content {
            entry.content = content.clone();
        }
        entry.updated_at = current_timestamp();

        sqlx::query("UPDATE entry SET title = ?, content = ?, updated_at = ? WHERE id = ?")
            .bind(&entry.title)
            .bind(&entry.content)
            .bind(entry.updated_at)
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(map_sqlx_error)?;

        self.changes.publish(&ChangeSet::entry(id)).await;
        Ok(entry)
    }

    async fn delete(&self, id: Id) -> DbResult<Entry> {
        let entry = self.get(id).await?;

        let result = sqlx::query("DELETE FROM entry WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Entry", id));
        }

        self.changes.publish(&ChangeSet::entry(id)).await;
        Ok(entry)
    }

    async fn add_tag(&self, entry_id: Id, tag_id: Id) -> DbResult<bool> {
        let linked = self.add_tags(entry_id, &[tag_id]).await?;
        Ok(!linked.is_empty())
    }

    async fn add_tags(&self, entry_id: Id, tag_ids: &[Id]) -> DbResult<Vec<Id>> {
        let mut tx = begin_write(self.pool).await?;

        let entry_exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM entry WHERE id = ?")
            .bind(entry_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if entry_exists.is_none() {
            return Err(DbError::not_found("Entry", entry_id));
        }

        let now = current_timestamp();
        let mut linked = Vec::new();
        for &tag_id in tag_ids {
            let tag_exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM tag WHERE id = ?")
                .bind(tag_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            if tag_exists.is_none() {
                return Err(DbError::not_found("Tag", tag_id));
            }

            let result = sqlx::query(
                "INSERT OR IGNORE INTO entry_tag (entry_id, tag_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(entry_id)
            .bind(tag_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            if result.rows_affected() > 0 {
                linked.push(tag_id);
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        // Re-attaching existing links commits nothing, so nothing is published.
        if !linked.is_empty() {
            let changes = ChangeSet::entry(entry_id).with_tags(linked.iter().copied());
            self.changes.publish(&changes).await;
        }
        Ok(linked)
    }

    async fn tags_for(&self, entry_id: Id) -> DbResult<Vec<Tag>> {
        let rows = sqlx::query(
            "SELECT t.id, t.name, t.description, t.created_at FROM tag t \
             JOIN entry_tag et ON et.tag_id = t.id WHERE et.entry_id = ? ORDER BY t.name",
        )
        .bind(entry_id)
        .fetch_all(self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn count(&self) -> DbResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entry")
            .fetch_one(self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(total as u64)
    }
}
