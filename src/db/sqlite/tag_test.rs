//! Tests for SqliteTagRepository.

use std::sync::Arc;

use crate::db::{Database, DbError, EntryRepository, NewEntry, NewTag, TagPatch, TagRepository};
use crate::events::ChangeSet;
use crate::testing::{RecordingListener, setup_db, setup_file_db};

fn new_tag(name: &str, description: Option<&str>) -> NewTag {
    NewTag {
        name: name.to_string(),
        description: description.map(str::to_string),
        created_at: None,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn tag_create_and_get_by_name() {
    let db = setup_db().await;

    let created = db
        .tags()
        .create(&new_tag("travel", Some("Trips and places")))
        .await
        .expect("Create should succeed");

    let by_id = db.tags().get(created.id).await.unwrap();
    assert_eq!(by_id.description.as_deref(), Some("Trips and places"));

    let by_name = db.tags().get_by_name("travel").await.unwrap();
    assert_eq!(by_name, Some(by_id));
    assert_eq!(db.tags().get_by_name("Travel").await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_tag_name_is_rejected() {
    let db = setup_db().await;
    db.tags().create(&new_tag("work", None)).await.unwrap();

    let err = db.tags().create(&new_tag("work", None)).await.unwrap_err();
    assert!(matches!(err, DbError::AlreadyExists { .. }));
    assert_eq!(db.tags().count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn tag_update_renames() {
    let db = setup_db().await;
    let tag = db.tags().create(&new_tag("wrk", None)).await.unwrap();

    let updated = db
        .tags()
        .update(
            tag.id,
            &TagPatch {
                name: Some("work".to_string()),
                description: Some("Job things".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "work");
    assert_eq!(db.tags().get(tag.id).await.unwrap().name, "work");
}

#[tokio::test(flavor = "multi_thread")]
async fn tag_delete_publishes_affected_entries() {
    let db = setup_db().await;
    let tag = db.tags().create(&new_tag("family", None)).await.unwrap();
    let mut entry_ids = Vec::new();
    for title in ["dinner", "visit"] {
        let entry = db
            .entries()
            .create(&NewEntry {
                title: title.to_string(),
                ..NewEntry::default()
            })
            .await
            .unwrap();
        db.entries().add_tag(entry.id, tag.id).await.unwrap();
        entry_ids.push(entry.id);
    }

    let listener = RecordingListener::<ChangeSet>::new();
    db.changes().subscribe(listener.clone());

    db.tags().delete(tag.id).await.expect("Delete should succeed");

    assert_eq!(
        listener.take(),
        vec![ChangeSet::tag(tag.id).with_entries(entry_ids.clone())]
    );
    for id in entry_ids {
        assert!(db.entries().get(id).await.unwrap().tag_ids.is_empty());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn tag_list_is_sorted_by_name() {
    let db = setup_db().await;
    for name in ["zebra", "apple", "mango"] {
        db.tags().create(&new_tag(name, None)).await.unwrap();
    }

    let names: Vec<String> = db
        .tags()
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["apple", "mango", "zebra"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn tag_delete_waits_for_concurrent_writers() {
    let (_dir, db) = setup_file_db().await;
    let entry = db
        .entries()
        .create(&NewEntry {
            title: "Seed".to_string(),
            content: "body".to_string(),
            created_at: None,
        })
        .await
        .unwrap();

    for round in 0..50 {
        let tag_id = db
            .tags()
            .create(&new_tag(&format!("tag-{}", round), None))
            .await
            .unwrap()
            .id;
        db.entries().add_tag(entry.id, tag_id).await.unwrap();

        let deleter = {
            let db = Arc::clone(&db);
            tokio::spawn(async move { db.tags().delete(tag_id).await })
        };
        let writer = {
            let db = Arc::clone(&db);
            tokio::spawn(async move {
                db.entries()
                    .create(&NewEntry {
                        title: format!("Round {}", round),
                        content: "body".to_string(),
                        created_at: None,
                    })
                    .await
            })
        };

        deleter.await.unwrap().expect("Tag delete should not fail");
        writer.await.unwrap().expect("Entry create should not fail");
    }

    assert_eq!(db.tags().count().await.unwrap(), 0);
    assert_eq!(db.entries().count().await.unwrap(), 51);
}
