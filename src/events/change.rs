//! Change values published on the mutation buses.

use std::collections::BTreeSet;

use crate::db::Id;

/// IDs touched by one committed storage write.
///
/// Ordered sets so fan-out (and therefore notification order) is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub entry_ids: BTreeSet<Id>,
    pub tag_ids: BTreeSet<Id>,
}

impl ChangeSet {
    pub fn entry(id: Id) -> Self {
        Self {
            entry_ids: BTreeSet::from([id]),
            tag_ids: BTreeSet::new(),
        }
    }

    pub fn tag(id: Id) -> Self {
        Self {
            entry_ids: BTreeSet::new(),
            tag_ids: BTreeSet::from([id]),
        }
    }

    pub fn with_entries(mut self, ids: impl IntoIterator<Item = Id>) -> Self {
        self.entry_ids.extend(ids);
        self
    }

    pub fn with_tags(mut self, ids: impl IntoIterator<Item = Id>) -> Self {
        self.tag_ids.extend(ids);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entry_ids.is_empty() && self.tag_ids.is_empty()
    }
}

/// A video registered after a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoChange {
    pub name: String,
}

impl VideoChange {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
