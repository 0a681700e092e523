//! Tests for prompt templates

use rmcp::model::{ErrorCode, JsonObject};
use serde_json::{Value, json};

use crate::db::{Database, EntryRepository, NewEntry, NewTag, SqliteDatabase, TagRepository};
use crate::mcp::capabilities::CapabilityFlags;
use crate::mcp::prompts;
use crate::testing::setup_db;

async fn primed(db: &SqliteDatabase) -> CapabilityFlags {
    let flags = CapabilityFlags::default();
    flags.recompute(&db.counts().await.unwrap());
    flags
}

fn args(value: Value) -> JsonObject {
    value.as_object().cloned().unwrap()
}

fn first_text(result: &rmcp::model::GetPromptResult) -> String {
    let wire = serde_json::to_value(result).unwrap();
    wire["messages"][0]["content"]["text"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test(flavor = "multi_thread")]
async fn prompts_hidden_until_there_are_entries() {
    let db = setup_db().await;
    let flags = primed(&db).await;

    let listed = serde_json::to_value(prompts::list(&flags)).unwrap();
    assert_eq!(listed["prompts"], json!([]));

    let err = prompts::get(&*db, &flags, prompts::SUMMARIZE_JOURNAL_ENTRIES, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
}

#[tokio::test(flavor = "multi_thread")]
async fn suggest_tags_embeds_entry_and_tags() {
    let db = setup_db().await;
    let entry = db
        .entries()
        .create(&NewEntry {
            title: "Marathon".to_string(),
            content: "Finished in under four hours".to_string(),
            created_at: None,
        })
        .await
        .unwrap();
    db.tags()
        .create(&NewTag {
            name: "running".to_string(),
            ..NewTag::default()
        })
        .await
        .unwrap();
    let flags = primed(&db).await;

    let listed = serde_json::to_value(prompts::list(&flags)).unwrap();
    let names: Vec<&str> = listed["prompts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["suggest_tags", "summarize_journal_entries"]);

    // Prompt arguments arrive as strings.
    let arguments = args(json!({ "entry_id": entry.id.to_string() }));
    let result = prompts::get(&*db, &flags, prompts::SUGGEST_TAGS, Some(&arguments))
        .await
        .unwrap();
    let text = first_text(&result);
    assert!(text.contains("Marathon"));
    assert!(text.contains("running"));
}

#[tokio::test(flavor = "multi_thread")]
async fn suggest_tags_requires_an_entry_id() {
    let db = setup_db().await;
    db.entries()
        .create(&NewEntry {
            title: "Marathon".to_string(),
            content: String::new(),
            created_at: None,
        })
        .await
        .unwrap();
    let flags = primed(&db).await;

    let err = prompts::get(&*db, &flags, prompts::SUGGEST_TAGS, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);

    let arguments = args(json!({ "entry_id": 404 }));
    let err = prompts::get(&*db, &flags, prompts::SUGGEST_TAGS, Some(&arguments))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::RESOURCE_NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn summarize_includes_every_entry() {
    let db = setup_db().await;
    for title in ["Monday", "Tuesday"] {
        db.entries()
            .create(&NewEntry {
                title: title.to_string(),
                content: "Work".to_string(),
                created_at: None,
            })
            .await
            .unwrap();
    }
    let flags = primed(&db).await;

    let result = prompts::get(&*db, &flags, prompts::SUMMARIZE_JOURNAL_ENTRIES, None)
        .await
        .unwrap();
    let text = first_text(&result);
    assert!(text.contains("Monday"));
    assert!(text.contains("Tuesday"));
}
