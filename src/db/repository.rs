//! Repository traits for data access abstraction.
//!
//! These traits define the contract for data access, allowing different
//! storage backends to be swapped without changing business logic.
//!
//! Every write that commits publishes exactly one event on the owning
//! database's bus, after the write is durable.

use std::future::Future;

use crate::db::{
    DbResult,
    models::{EntityCounts, Entry, EntryPatch, Id, NewEntry, NewTag, Tag, TagPatch, Video},
};
use crate::events::{ChangeSet, MutationBus, VideoChange};

/// Repository for Entry operations.
pub trait EntryRepository: Send + Sync {
    /// Create a new entry.
    fn create(&self, entry: &NewEntry) -> impl Future<Output = DbResult<Entry>> + Send;

    /// Get an entry by ID, including attached tag IDs.
    fn get(&self, id: Id) -> impl Future<Output = DbResult<Entry>> + Send;

    /// Get all entries, oldest first.
    fn list(&self) -> impl Future<Output = DbResult<Vec<Entry>>> + Send;

    /// Entries whose `created_at` lies in `[start, end)`.
    fn created_between(
        &self,
        start: i64,
        end: i64,
    ) -> impl Future<Output = DbResult<Vec<Entry>>> + Send;

    /// Apply a partial update.
    fn update(&self, id: Id, patch: &EntryPatch) -> impl Future<Output = DbResult<Entry>> + Send;

    /// Delete an entry by ID.
    fn delete(&self, id: Id) -> impl Future<Output = DbResult<Entry>> + Send;

    /// Attach a tag. Returns false when the link already existed.
    fn add_tag(&self, entry_id: Id, tag_id: Id) -> impl Future<Output = DbResult<bool>> + Send;

    /// Attach several tags in one write. Returns the IDs that were newly linked.
    fn add_tags(
        &self,
        entry_id: Id,
        tag_ids: &[Id],
    ) -> impl Future<Output = DbResult<Vec<Id>>> + Send;

    /// Tags attached to an entry.
    fn tags_for(&self, entry_id: Id) -> impl Future<Output = DbResult<Vec<Tag>>> + Send;

    fn count(&self) -> impl Future<Output = DbResult<u64>> + Send;
}

/// Repository for Tag operations.
pub trait TagRepository: Send + Sync {
    /// Create a new tag. Fails with `AlreadyExists` on a duplicate name.
    fn create(&self, tag: &NewTag) -> impl Future<Output = DbResult<Tag>> + Send;

    fn get(&self, id: Id) -> impl Future<Output = DbResult<Tag>> + Send;

    fn get_by_name(&self, name: &str) -> impl Future<Output = DbResult<Option<Tag>>> + Send;

    /// Get all tags, by name.
    fn list(&self) -> impl Future<Output = DbResult<Vec<Tag>>> + Send;

    fn created_between(
        &self,
        start: i64,
        end: i64,
    ) -> impl Future<Output = DbResult<Vec<Tag>>> + Send;

    fn update(&self, id: Id, patch: &TagPatch) -> impl Future<Output = DbResult<Tag>> + Send;

    /// Delete a tag, detaching it from every entry.
    fn delete(&self, id: Id) -> impl Future<Output = DbResult<Tag>> + Send;

    fn count(&self) -> impl Future<Output = DbResult<u64>> + Send;
}

/// Repository for rendered videos.
pub trait VideoRepository: Send + Sync {
    /// Register a rendered artifact.
    fn create(&self, video: &Video) -> impl Future<Output = DbResult<Video>> + Send;

    fn get(&self, name: &str) -> impl Future<Output = DbResult<Video>> + Send;

    fn list(&self) -> impl Future<Output = DbResult<Vec<Video>>> + Send;

    fn count(&self) -> impl Future<Output = DbResult<u64>> + Send;
}

/// Combined database interface.
pub trait Database: Send + Sync {
    type Entries<'a>: EntryRepository
    where
        Self: 'a;
    type Tags<'a>: TagRepository
    where
        Self: 'a;
    type Videos<'a>: VideoRepository
    where
        Self: 'a;

    /// Run pending migrations.
    fn migrate(&self) -> impl Future<Output = DbResult<()>> + Send;

    fn entries(&self) -> Self::Entries<'_>;

    fn tags(&self) -> Self::Tags<'_>;

    fn videos(&self) -> Self::Videos<'_>;

    /// Bus receiving one `ChangeSet` per committed entry/tag write.
    fn changes(&self) -> &MutationBus<ChangeSet>;

    /// Bus receiving one `VideoChange` per registered video.
    fn video_changes(&self) -> &MutationBus<VideoChange>;

    /// Full counts, recomputed from storage on every call.
    fn counts(&self) -> impl Future<Output = DbResult<EntityCounts>> + Send {
        async move {
            Ok(EntityCounts {
                entries: self.entries().count().await?,
                tags: self.tags().count().await?,
                videos: self.videos().count().await?,
            })
        }
    }
}
