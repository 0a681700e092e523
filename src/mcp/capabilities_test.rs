//! Tests for capability recompute-and-diff.

use std::sync::Arc;

use mockall::{Sequence, predicate::eq};

use crate::db::{
    Database, EntityCounts, EntryRepository, NewEntry, NewTag, SqliteDatabase, TagRepository,
    Video, VideoRepository,
};
use crate::mcp::capabilities::*;
use crate::mcp::client::{ChannelError, MockClientChannel};
use crate::testing::{setup_db, setup_file_db};

struct Harness {
    db: Arc<SqliteDatabase>,
    flags: Arc<CapabilityFlags>,
    machine: Arc<CapabilityStateMachine<SqliteDatabase>>,
}

/// State machine over `db`. Refreshes are driven by the test, not the bus.
fn harness(db: Arc<SqliteDatabase>, channel: MockClientChannel) -> Harness {
    let flags = Arc::new(CapabilityFlags::default());
    let machine = Arc::new(CapabilityStateMachine::new(
        Arc::clone(&db),
        Arc::clone(&flags),
        Arc::new(channel),
    ));
    Harness { db, flags, machine }
}

/// State machine listening on both buses, accepting any notification.
fn listening_harness(db: Arc<SqliteDatabase>) -> Harness {
    let mut channel = MockClientChannel::new();
    channel.expect_list_changed().returning(|_| Ok(()));
    let h = harness(db, channel);
    h.db.changes().subscribe(h.machine.clone());
    h.db.video_changes().subscribe(h.machine.clone());
    h
}

fn expect_once(channel: &mut MockClientChannel, seq: &mut Sequence, kind: CapabilityKind) {
    channel
        .expect_list_changed()
        .with(eq(kind))
        .times(1)
        .in_sequence(seq)
        .returning(|_| Ok(()));
}

async fn assert_flags_match_counts(h: &Harness) {
    let counts = h.db.counts().await.unwrap();
    for spec in CATALOG {
        assert_eq!(
            h.flags.is_enabled(spec.kind, spec.name),
            (spec.predicate)(&counts),
            "{:?} {} with {:?}",
            spec.kind,
            spec.name,
            counts
        );
    }
}

fn new_entry(title: &str) -> NewEntry {
    NewEntry {
        title: title.to_string(),
        content: "body".to_string(),
        created_at: None,
    }
}

fn new_tag(name: &str) -> NewTag {
    NewTag {
        name: name.to_string(),
        ..NewTag::default()
    }
}

#[test]
fn flags_start_disabled() {
    let flags = CapabilityFlags::default();
    for spec in CATALOG {
        assert!(!flags.is_enabled(spec.kind, spec.name));
        assert!(flags.is_known(spec.kind, spec.name));
    }
    assert!(!flags.is_known(CapabilityKind::Tool, "launch_rockets"));
}

#[test]
fn recompute_flips_only_differing_flags() {
    let flags = CapabilityFlags::default();

    let first = flags.recompute(&EntityCounts::default());
    assert_eq!(first.flips.len(), 2);
    assert!(first.flips.iter().all(|f| f.enabled));
    assert_eq!(first.kinds().into_iter().collect::<Vec<_>>(), vec![CapabilityKind::Tool]);

    // Same counts again: nothing to flip.
    assert!(flags.recompute(&EntityCounts::default()).is_empty());

    let report = flags.recompute(&EntityCounts {
        entries: 1,
        tags: 0,
        videos: 0,
    });
    assert_eq!(
        report.kinds().into_iter().collect::<Vec<_>>(),
        vec![
            CapabilityKind::Tool,
            CapabilityKind::Resource,
            CapabilityKind::Prompt
        ]
    );
    assert_eq!(
        flags.enabled(CapabilityKind::Prompt),
        vec!["suggest_tags", "summarize_journal_entries"]
    );
    assert!(!flags.is_enabled(CapabilityKind::Tool, "add_tag_to_entry"));
}

#[tokio::test(flavor = "multi_thread")]
async fn prime_is_silent() {
    // No expectations: any notification fails the test.
    let h = harness(setup_db().await, MockClientChannel::new());

    let report = h.machine.prime().await.unwrap();

    assert_eq!(report.flips.len(), 2);
    assert_eq!(
        h.flags.enabled(CapabilityKind::Tool),
        vec!["create_entry", "create_tag"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn first_entry_notifies_each_kind_once() {
    let mut channel = MockClientChannel::new();
    let mut seq = Sequence::new();
    expect_once(&mut channel, &mut seq, CapabilityKind::Tool);
    expect_once(&mut channel, &mut seq, CapabilityKind::Resource);
    expect_once(&mut channel, &mut seq, CapabilityKind::Prompt);
    let h = harness(setup_db().await, channel);
    h.machine.prime().await.unwrap();

    h.db.entries().create(&new_entry("one")).await.unwrap();
    let report = h.machine.refresh().await.unwrap();
    assert_eq!(report.kinds().len(), 3);
    assert_flags_match_counts(&h).await;

    // Second entry flips nothing.
    h.db.entries().create(&new_entry("two")).await.unwrap();
    assert!(h.machine.refresh().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn tag_creation_coalesces_tool_flips() {
    let db = setup_db().await;
    db.entries().create(&new_entry("one")).await.unwrap();

    let mut channel = MockClientChannel::new();
    let mut seq = Sequence::new();
    expect_once(&mut channel, &mut seq, CapabilityKind::Tool);
    expect_once(&mut channel, &mut seq, CapabilityKind::Resource);
    let h = harness(db, channel);
    h.machine.prime().await.unwrap();

    // Enables get/list/update/delete_tag and add_tag_to_entry: five tool flips.
    h.db.tags().create(&new_tag("work")).await.unwrap();
    let report = h.machine.refresh().await.unwrap();

    let tool_flips = report
        .flips
        .iter()
        .filter(|f| f.kind == CapabilityKind::Tool)
        .count();
    assert_eq!(tool_flips, 5);
    assert!(h.flags.is_enabled(CapabilityKind::Tool, "add_tag_to_entry"));
    assert_flags_match_counts(&h).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn deleting_last_entry_disables_again() {
    let db = setup_db().await;
    let entry = db.entries().create(&new_entry("one")).await.unwrap();
    db.tags().create(&new_tag("work")).await.unwrap();

    let mut channel = MockClientChannel::new();
    let mut seq = Sequence::new();
    expect_once(&mut channel, &mut seq, CapabilityKind::Tool);
    expect_once(&mut channel, &mut seq, CapabilityKind::Resource);
    expect_once(&mut channel, &mut seq, CapabilityKind::Prompt);
    let h = harness(db, channel);
    h.machine.prime().await.unwrap();

    h.db.entries().delete(entry.id).await.unwrap();
    h.machine.refresh().await.unwrap();

    assert!(!h.flags.is_enabled(CapabilityKind::Tool, "get_entry"));
    assert!(h.flags.is_enabled(CapabilityKind::Tool, "get_tag"));
    assert_flags_match_counts(&h).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn video_registration_enables_video_capabilities() {
    let mut channel = MockClientChannel::new();
    let mut seq = Sequence::new();
    expect_once(&mut channel, &mut seq, CapabilityKind::Tool);
    expect_once(&mut channel, &mut seq, CapabilityKind::Resource);
    let h = harness(setup_db().await, channel);
    h.machine.prime().await.unwrap();

    h.db.videos()
        .create(&Video {
            name: "wrapped-2025-1".to_string(),
            path: "/tmp/wrapped-2025-1.json".to_string(),
            year: 2025,
            mime_type: "application/json".to_string(),
            created_at: 0,
        })
        .await
        .unwrap();
    h.machine.refresh().await.unwrap();

    assert!(h.flags.is_enabled(CapabilityKind::Tool, "get_video"));
    assert!(h.flags.is_enabled(CapabilityKind::Resource, "videos"));
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_notification_still_flips_flags() {
    let mut channel = MockClientChannel::new();
    channel
        .expect_list_changed()
        .with(eq(CapabilityKind::Tool))
        .times(1)
        .returning(|_| Err(ChannelError::NotConnected));
    channel
        .expect_list_changed()
        .with(eq(CapabilityKind::Resource))
        .times(1)
        .returning(|_| Ok(()));
    channel
        .expect_list_changed()
        .with(eq(CapabilityKind::Prompt))
        .times(1)
        .returning(|_| Ok(()));
    let h = harness(setup_db().await, channel);
    h.machine.prime().await.unwrap();

    h.db.entries().create(&new_entry("one")).await.unwrap();

    assert!(h.machine.refresh().await.is_err());
    assert!(h.flags.is_enabled(CapabilityKind::Tool, "get_entry"));
    assert_flags_match_counts(&h).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn flags_track_counts_through_a_sequence() {
    let h = listening_harness(setup_db().await);
    h.machine.prime().await.unwrap();

    let a = h.db.entries().create(&new_entry("a")).await.unwrap();
    assert_flags_match_counts(&h).await;
    let tag = h.db.tags().create(&new_tag("t")).await.unwrap();
    assert_flags_match_counts(&h).await;
    h.db.entries().add_tag(a.id, tag.id).await.unwrap();
    assert_flags_match_counts(&h).await;
    h.db.tags().delete(tag.id).await.unwrap();
    assert_flags_match_counts(&h).await;
    h.db.entries().delete(a.id).await.unwrap();
    assert_flags_match_counts(&h).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn overlapping_writes_leave_flags_matching_storage() {
    let (_dir, db) = setup_file_db().await;
    let h = listening_harness(db);
    h.machine.prime().await.unwrap();

    for round in 0..100 {
        let seed = h.db.entries().create(&new_entry("seed")).await.unwrap();

        let deleter = {
            let db = Arc::clone(&h.db);
            tokio::spawn(async move { db.entries().delete(seed.id).await })
        };
        let creator = {
            let db = Arc::clone(&h.db);
            tokio::spawn(async move {
                db.entries()
                    .create(&new_entry(&format!("round {}", round)))
                    .await
            })
        };
        deleter.await.unwrap().unwrap();
        let created = creator.await.unwrap().unwrap();

        assert_flags_match_counts(&h).await;

        // Back to an empty journal for the next round.
        h.db.entries().delete(created.id).await.unwrap();
        assert_flags_match_counts(&h).await;
    }
}
