//! Tests for MutationBus fan-out.

use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;

use super::bus::{ChangeListener, ListenerError, MutationBus};
use super::change::ChangeSet;

/// Records every event it sees under a label into a shared log.
struct Recorder {
    label: &'static str,
    log: Arc<Mutex<Vec<(&'static str, ChangeSet)>>>,
}

impl ChangeListener<ChangeSet> for Recorder {
    fn on_change<'a>(
        &'a self,
        event: &'a ChangeSet,
    ) -> BoxFuture<'a, Result<(), ListenerError>> {
        Box::pin(async move {
            self.log.lock().unwrap().push((self.label, event.clone()));
            Ok(())
        })
    }
}

struct Failing;

impl ChangeListener<ChangeSet> for Failing {
    fn on_change<'a>(&'a self, _: &'a ChangeSet) -> BoxFuture<'a, Result<(), ListenerError>> {
        Box::pin(async move {
            Err(ListenerError::Notify {
                message: "client went away".to_string(),
            })
        })
    }
}

struct Panicking;

impl ChangeListener<ChangeSet> for Panicking {
    fn on_change<'a>(&'a self, _: &'a ChangeSet) -> BoxFuture<'a, Result<(), ListenerError>> {
        Box::pin(async move { panic!("listener bug") })
    }
}

/// Unsubscribes a victim listener from inside dispatch.
struct Unsubscriber {
    bus: MutationBus<ChangeSet>,
    victim: Mutex<Option<super::bus::ListenerId>>,
}

impl ChangeListener<ChangeSet> for Unsubscriber {
    fn on_change<'a>(&'a self, _: &'a ChangeSet) -> BoxFuture<'a, Result<(), ListenerError>> {
        Box::pin(async move {
            if let Some(id) = self.victim.lock().unwrap().take() {
                self.bus.unsubscribe(id);
            }
            Ok(())
        })
    }
}

fn recorder(
    label: &'static str,
    log: &Arc<Mutex<Vec<(&'static str, ChangeSet)>>>,
) -> Arc<Recorder> {
    Arc::new(Recorder {
        label,
        log: Arc::clone(log),
    })
}

#[tokio::test]
async fn publish_reaches_listeners_in_registration_order() {
    let bus = MutationBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    bus.subscribe(recorder("first", &log));
    bus.subscribe(recorder("second", &log));
    bus.subscribe(recorder("third", &log));

    let report = bus.publish(&ChangeSet::entry(1)).await;

    assert_eq!(report.delivered, 3);
    assert_eq!(report.failed, 0);
    let log = log.lock().unwrap();
    let labels: Vec<_> = log.iter().map(|(label, _)| *label).collect();
    assert_eq!(labels, vec!["first", "second", "third"]);
    assert!(log.iter().all(|(_, event)| *event == ChangeSet::entry(1)));
}

#[tokio::test]
async fn failing_listener_does_not_stop_the_others() {
    let bus = MutationBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    bus.subscribe(Arc::new(Failing));
    bus.subscribe(recorder("after-error", &log));
    bus.subscribe(Arc::new(Panicking));
    bus.subscribe(recorder("after-panic", &log));

    let report = bus.publish(&ChangeSet::tag(9)).await;

    assert_eq!(report.failed, 2);
    assert_eq!(report.delivered, 2);
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn unsubscribe_during_dispatch_keeps_in_flight_delivery() {
    let bus = MutationBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let unsubscriber = Arc::new(Unsubscriber {
        bus: bus.clone(),
        victim: Mutex::new(None),
    });
    bus.subscribe(unsubscriber.clone());
    let victim = bus.subscribe(recorder("victim", &log));
    *unsubscriber.victim.lock().unwrap() = Some(victim);

    bus.publish(&ChangeSet::entry(1)).await;
    assert_eq!(log.lock().unwrap().len(), 1, "snapshot still delivers");

    bus.publish(&ChangeSet::entry(2)).await;
    assert_eq!(log.lock().unwrap().len(), 1, "removed for later dispatches");
}

#[tokio::test]
async fn guard_unsubscribes_on_drop() {
    let bus = MutationBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let guard = bus.subscribe_guarded(recorder("guarded", &log));
    assert_eq!(bus.listener_count(), 1);
    bus.publish(&ChangeSet::entry(1)).await;

    drop(guard);
    assert_eq!(bus.listener_count(), 0);
    bus.publish(&ChangeSet::entry(2)).await;

    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unsubscribing_unknown_listener_is_a_no_op() {
    let bus: MutationBus<ChangeSet> = MutationBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let id = bus.subscribe(recorder("once", &log));

    assert!(bus.unsubscribe(id));
    assert!(!bus.unsubscribe(id));
}

#[test]
fn change_set_builders_merge_ids() {
    let changes = ChangeSet::tag(4).with_entries([1, 2, 2]);
    assert_eq!(changes.entry_ids.len(), 2);
    assert!(changes.tag_ids.contains(&4));
    assert!(!changes.is_empty());
    assert!(ChangeSet::default().is_empty());
}
