//! Dynamic capability exposure.
//!
//! Each tool, resource and prompt the server knows about has a flag whose
//! value is a pure function of [`EntityCounts`]. The only way a flag
//! changes is [`CapabilityFlags::recompute`]; [`CapabilityStateMachine`]
//! runs it after every committed change and tells the client, once per
//! kind, that a list changed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::client::ClientChannel;
use crate::db::{Database, EntityCounts};
use crate::events::{ChangeListener, ChangeSet, ListenerError, VideoChange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    Tool,
    Resource,
    Prompt,
}

pub type Predicate = fn(&EntityCounts) -> bool;

/// Static description of one gated capability.
#[derive(Clone, Copy)]
pub struct CapabilitySpec {
    pub kind: CapabilityKind,
    pub name: &'static str,
    pub predicate: Predicate,
}

fn always(_: &EntityCounts) -> bool {
    true
}

fn has_entries(c: &EntityCounts) -> bool {
    c.entries > 0
}

fn has_tags(c: &EntityCounts) -> bool {
    c.tags > 0
}

fn has_entries_and_tags(c: &EntityCounts) -> bool {
    c.entries > 0 && c.tags > 0
}

fn has_videos(c: &EntityCounts) -> bool {
    c.videos > 0
}

const fn tool(name: &'static str, predicate: Predicate) -> CapabilitySpec {
    CapabilitySpec {
        kind: CapabilityKind::Tool,
        name,
        predicate,
    }
}

const fn resource(name: &'static str, predicate: Predicate) -> CapabilitySpec {
    CapabilitySpec {
        kind: CapabilityKind::Resource,
        name,
        predicate,
    }
}

const fn prompt(name: &'static str, predicate: Predicate) -> CapabilitySpec {
    CapabilitySpec {
        kind: CapabilityKind::Prompt,
        name,
        predicate,
    }
}

/// Every capability the server can expose.
pub const CATALOG: &[CapabilitySpec] = &[
    tool("create_entry", always),
    tool("create_tag", always),
    tool("get_entry", has_entries),
    tool("list_entries", has_entries),
    tool("update_entry", has_entries),
    tool("delete_entry", has_entries),
    tool("get_tag", has_tags),
    tool("list_tags", has_tags),
    tool("update_tag", has_tags),
    tool("delete_tag", has_tags),
    tool("add_tag_to_entry", has_entries_and_tags),
    tool("create_wrapped_video", has_entries),
    tool("get_video", has_videos),
    resource("entries", has_entries),
    resource("tags", has_tags),
    resource("videos", has_videos),
    prompt("suggest_tags", has_entries),
    prompt("summarize_journal_entries", has_entries),
];

/// One flag that changed during a recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flip {
    pub kind: CapabilityKind,
    pub name: &'static str,
    pub enabled: bool,
}

/// Flags changed by a single recompute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlipReport {
    pub flips: Vec<Flip>,
}

impl FlipReport {
    /// Kinds with at least one flip; each owes the client one list-changed.
    pub fn kinds(&self) -> BTreeSet<CapabilityKind> {
        self.flips.iter().map(|f| f.kind).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.flips.is_empty()
    }
}

struct FlagState {
    enabled: bool,
    predicate: Predicate,
}

/// Current enabled flags, keyed by kind and name.
pub struct CapabilityFlags {
    flags: RwLock<BTreeMap<(CapabilityKind, &'static str), FlagState>>,
}

impl Default for CapabilityFlags {
    fn default() -> Self {
        Self::new(CATALOG)
    }
}

impl CapabilityFlags {
    /// Create every flag once, disabled until the first recompute.
    pub fn new(catalog: &[CapabilitySpec]) -> Self {
        let flags = catalog
            .iter()
            .map(|spec| {
                (
                    (spec.kind, spec.name),
                    FlagState {
                        enabled: false,
                        predicate: spec.predicate,
                    },
                )
            })
            .collect();
        Self {
            flags: RwLock::new(flags),
        }
    }

    /// Unknown names are never enabled.
    pub fn is_enabled(&self, kind: CapabilityKind, name: &str) -> bool {
        self.flags
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .any(|((k, n), state)| *k == kind && *n == name && state.enabled)
    }

    pub fn is_known(&self, kind: CapabilityKind, name: &str) -> bool {
        self.flags
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .any(|(k, n)| *k == kind && *n == name)
    }

    /// Names of enabled capabilities of one kind, sorted.
    pub fn enabled(&self, kind: CapabilityKind) -> Vec<&'static str> {
        self.flags
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|((k, _), state)| *k == kind && state.enabled)
            .map(|((_, name), _)| *name)
            .collect()
    }

    /// Re-evaluate every predicate and flip the flags that disagree.
    pub fn recompute(&self, counts: &EntityCounts) -> FlipReport {
        let mut flags = self
            .flags
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut report = FlipReport::default();
        for ((kind, name), state) in flags.iter_mut() {
            let wanted = (state.predicate)(counts);
            if wanted != state.enabled {
                state.enabled = wanted;
                report.flips.push(Flip {
                    kind: *kind,
                    name,
                    enabled: wanted,
                });
            }
        }
        report
    }
}

/// Keeps [`CapabilityFlags`] in step with storage and notifies the client.
///
/// Refreshes run one at a time from count to notification, so a refresh
/// holding older counts can never overwrite one holding newer counts.
pub struct CapabilityStateMachine<D: Database> {
    db: Arc<D>,
    flags: Arc<CapabilityFlags>,
    channel: Arc<dyn ClientChannel>,
    refresh_lock: Mutex<()>,
}

impl<D: Database> CapabilityStateMachine<D> {
    pub fn new(db: Arc<D>, flags: Arc<CapabilityFlags>, channel: Arc<dyn ClientChannel>) -> Self {
        Self {
            db,
            flags,
            channel,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn flags(&self) -> &Arc<CapabilityFlags> {
        &self.flags
    }

    /// Align flags with storage without notifying (before the client lists anything).
    pub async fn prime(&self) -> Result<FlipReport, ListenerError> {
        let _guard = self.refresh_lock.lock().await;
        let counts = self.db.counts().await?;
        let report = self.flags.recompute(&counts);
        debug!(?counts, flips = report.flips.len(), "Capabilities primed");
        Ok(report)
    }

    /// Recompute from fresh counts and send one list-changed per flipped kind.
    pub async fn refresh(&self) -> Result<FlipReport, ListenerError> {
        let _guard = self.refresh_lock.lock().await;
        let counts = self.db.counts().await?;
        let report = self.flags.recompute(&counts);

        let mut first_error = None;
        for kind in report.kinds() {
            for flip in report.flips.iter().filter(|f| f.kind == kind) {
                debug!(?kind, name = flip.name, enabled = flip.enabled, "Capability flipped");
            }
            if let Err(e) = self.channel.list_changed(kind).await {
                warn!(?kind, error = %e, "Failed to send list-changed notification");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(report),
        }
    }
}

impl<D: Database> ChangeListener<ChangeSet> for CapabilityStateMachine<D> {
    fn on_change<'a>(&'a self, _: &'a ChangeSet) -> BoxFuture<'a, Result<(), ListenerError>> {
        Box::pin(async move { self.refresh().await.map(|_| ()) })
    }
}

impl<D: Database> ChangeListener<VideoChange> for CapabilityStateMachine<D> {
    fn on_change<'a>(&'a self, _: &'a VideoChange) -> BoxFuture<'a, Result<(), ListenerError>> {
        Box::pin(async move { self.refresh().await.map(|_| ()) })
    }
}
