//! Ordered, failure-isolated fan-out of committed changes.
//!
//! Storage publishes one event per committed write; every registered
//! listener sees it once, in registration order. A listener that returns an
//! error or panics is logged and skipped, the remaining listeners still run
//! and the publisher never sees the failure.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::db::DbError;

/// Errors a listener may report back to the bus.
#[derive(Error, Diagnostic, Debug)]
pub enum ListenerError {
    #[error("Listener storage error: {0}")]
    #[diagnostic(code(epicme::events::storage))]
    Db(#[from] DbError),

    #[error("Listener could not notify client: {message}")]
    #[diagnostic(code(epicme::events::notify))]
    Notify { message: String },
}

/// Receives events from a [`MutationBus`].
pub trait ChangeListener<E>: Send + Sync {
    fn on_change<'a>(&'a self, event: &'a E) -> BoxFuture<'a, Result<(), ListenerError>>;
}

/// Identifies a registration on one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Outcome of a single [`MutationBus::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

type Registration<E> = (ListenerId, Arc<dyn ChangeListener<E>>);

struct BusInner<E> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Registration<E>>>,
}

impl<E> BusInner<E> {
    fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }
}

/// In-process event bus. Cloning shares the listener list.
pub struct MutationBus<E> {
    inner: Arc<BusInner<E>>,
}

impl<E> Clone for MutationBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> Default for MutationBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> MutationBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                next_id: AtomicU64::new(1),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a listener. It receives every event published afterwards.
    pub fn subscribe(&self, listener: Arc<dyn ChangeListener<E>>) -> ListenerId {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, listener));
        debug!(listener = id.0, "Listener subscribed");
        id
    }

    /// Register a listener that is removed again when the guard drops.
    pub fn subscribe_guarded(&self, listener: Arc<dyn ChangeListener<E>>) -> ListenerGuard
    where
        E: 'static,
    {
        let id = self.subscribe(listener);
        let bus: Weak<BusInner<E>> = Arc::downgrade(&self.inner);
        ListenerGuard {
            unsubscribe: Some(Box::new(move || {
                if let Some(bus) = bus.upgrade() {
                    bus.remove(id);
                }
            })),
        }
    }

    /// Remove a listener. Unknown IDs are ignored.
    ///
    /// A dispatch already in progress keeps delivering to the listener.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Deliver `event` to every listener registered at call time.
    pub async fn publish(&self, event: &E) -> DispatchReport {
        let snapshot: Vec<Registration<E>> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        let mut report = DispatchReport::default();
        for (id, listener) in snapshot {
            let outcome = AssertUnwindSafe(async { listener.on_change(event).await })
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(listener = id.0, error = %e, "Change listener failed");
                }
                Err(_) => {
                    report.failed += 1;
                    error!(listener = id.0, "Change listener panicked");
                }
            }
        }
        report
    }
}

/// Unsubscribes its listener on drop.
#[must_use = "dropping the guard unsubscribes the listener"]
pub struct ListenerGuard {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}
