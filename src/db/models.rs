//! Domain models for the journal database.
//!
//! These models are storage-agnostic and represent the core entities
//! used throughout the application.

use serde::{Deserialize, Serialize};

/// Row ID type assigned by storage for entries and tags.
pub type Id = i64;

/// A journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Id,
    pub title: String,
    pub content: String,
    /// Attached tag IDs (M:N relationship via entry_tag)
    #[serde(default)]
    pub tag_ids: Vec<Id>,
    /// Epoch seconds.
    pub created_at: i64,
    /// Epoch seconds.
    pub updated_at: i64,
}

/// Input for creating an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEntry {
    pub title: String,
    pub content: String,
    /// Explicit creation time (import/backfill). `None` means now.
    pub created_at: Option<i64>,
}

/// Partial update for an entry. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// A tag that can be attached to entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    /// Epoch seconds.
    pub created_at: i64,
}

/// Input for creating a tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTag {
    pub name: String,
    pub description: Option<String>,
    pub created_at: Option<i64>,
}

/// Partial update for a tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// A rendered "wrapped" video artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub name: String,
    pub path: String,
    pub year: i32,
    pub mime_type: String,
    pub created_at: i64,
}

/// Full row counts, the only input to capability predicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub entries: u64,
    pub tags: u64,
    pub videos: u64,
}
