//! Tests for SqliteVideoRepository.

use crate::db::{Database, DbError, Video, VideoRepository};
use crate::events::{ChangeSet, VideoChange};
use crate::testing::{RecordingListener, setup_db};

fn video(name: &str) -> Video {
    Video {
        name: name.to_string(),
        path: format!("/tmp/{}.mp4", name),
        year: 2025,
        mime_type: "video/mp4".to_string(),
        created_at: 1_735_689_600,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn video_create_publishes_on_video_bus_only() {
    let db = setup_db().await;
    let videos = RecordingListener::<VideoChange>::new();
    let changes = RecordingListener::<ChangeSet>::new();
    db.video_changes().subscribe(videos.clone());
    db.changes().subscribe(changes.clone());

    db.videos().create(&video("wrapped-2025-a")).await.unwrap();

    assert_eq!(videos.take(), vec![VideoChange::new("wrapped-2025-a")]);
    assert!(changes.take().is_empty());
    assert_eq!(db.videos().count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn video_get_missing_returns_not_found() {
    let db = setup_db().await;

    let err = db.videos().get("nope").await.unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_video_name_is_rejected() {
    let db = setup_db().await;
    db.videos().create(&video("dup")).await.unwrap();

    let err = db.videos().create(&video("dup")).await.unwrap_err();
    assert!(matches!(err, DbError::AlreadyExists { .. }));
    assert_eq!(db.videos().list().await.unwrap().len(), 1);
}
