//! Resource subscriptions and per-URI update notifications.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use futures_util::future::BoxFuture;
use tracing::{debug, warn};

use super::client::ClientChannel;
use super::uri::{entry_uri, tag_uri, video_uri};
use crate::db::{Database, EntryRepository, Id, TagRepository, VideoRepository};
use crate::events::{ChangeListener, ChangeSet, ListenerError, VideoChange};

/// URIs the session's client asked to watch.
#[derive(Default)]
pub struct SubscriptionRegistry {
    uris: RwLock<BTreeSet<String>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the URI was already watched.
    pub fn subscribe(&self, uri: impl Into<String>) -> bool {
        self.uris
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(uri.into())
    }

    /// Returns false when the URI was not watched.
    pub fn unsubscribe(&self, uri: &str) -> bool {
        self.uris
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(uri)
    }

    pub fn is_subscribed(&self, uri: &str) -> bool {
        self.uris
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(uri)
    }

    pub fn list(&self) -> Vec<String> {
        self.uris
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

/// Turns bus events into resource-updated notifications for watched URIs.
pub struct ResourceNotifier<D: Database> {
    db: Arc<D>,
    registry: Arc<SubscriptionRegistry>,
    channel: Arc<dyn ClientChannel>,
}

impl<D: Database> ResourceNotifier<D> {
    pub fn new(
        db: Arc<D>,
        registry: Arc<SubscriptionRegistry>,
        channel: Arc<dyn ClientChannel>,
    ) -> Self {
        Self {
            db,
            registry,
            channel,
        }
    }

    async fn entry_title(&self, id: Id) -> Result<String, ListenerError> {
        match self.db.entries().get(id).await {
            Ok(entry) => Ok(entry.title),
            Err(e) if e.is_not_found() => Ok(format!("Deleted entry {}", id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn tag_title(&self, id: Id) -> Result<String, ListenerError> {
        match self.db.tags().get(id).await {
            Ok(tag) => Ok(tag.name),
            Err(e) if e.is_not_found() => Ok(format!("Deleted tag {}", id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn send(&self, uri: &str, title: &str) -> Result<(), ListenerError> {
        debug!(uri, "Sending resource update");
        self.channel.resource_updated(uri, title).await.map_err(|e| {
            warn!(uri, error = %e, "Failed to send resource update");
            e.into()
        })
    }
}

impl<D: Database> ChangeListener<ChangeSet> for ResourceNotifier<D> {
    fn on_change<'a>(&'a self, change: &'a ChangeSet) -> BoxFuture<'a, Result<(), ListenerError>> {
        Box::pin(async move {
            // A failed URI must not starve the others in the same change set.
            let mut first_error = None;

            for &id in &change.entry_ids {
                let uri = entry_uri(id);
                if !self.registry.is_subscribed(&uri) {
                    continue;
                }
                let sent = match self.entry_title(id).await {
                    Ok(title) => self.send(&uri, &title).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = sent {
                    first_error.get_or_insert(e);
                }
            }

            for &id in &change.tag_ids {
                let uri = tag_uri(id);
                if !self.registry.is_subscribed(&uri) {
                    continue;
                }
                let sent = match self.tag_title(id).await {
                    Ok(title) => self.send(&uri, &title).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = sent {
                    first_error.get_or_insert(e);
                }
            }

            first_error.map_or(Ok(()), Err)
        })
    }
}

impl<D: Database> ChangeListener<VideoChange> for ResourceNotifier<D> {
    fn on_change<'a>(
        &'a self,
        change: &'a VideoChange,
    ) -> BoxFuture<'a, Result<(), ListenerError>> {
        Box::pin(async move {
            let uri = video_uri(&change.name);
            if !self.registry.is_subscribed(&uri) {
                return Ok(());
            }
            let title = match self.db.videos().get(&change.name).await {
                Ok(video) => video.name,
                Err(e) if e.is_not_found() => change.name.clone(),
                Err(e) => return Err(e.into()),
            };
            self.send(&uri, &title).await
        })
    }
}
