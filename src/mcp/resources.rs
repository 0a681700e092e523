//! Resource listing and reads, gated by the resource capability flags.

use base64::{Engine, engine::general_purpose::STANDARD};
use rmcp::{
    ErrorData as McpError,
    model::{
        AnnotateAble, ListResourceTemplatesResult, ListResourcesResult, RawResource,
        RawResourceTemplate, ReadResourceResult, ResourceContents,
    },
};
use serde_json::{Value, json};

use super::capabilities::{CapabilityFlags, CapabilityKind};
use super::tools::map_db_error;
use super::uri::{self, ResourceUri};
use crate::db::{Database, EntryRepository, TagRepository, VideoRepository};

const JSON_MIME: &str = "application/json";

fn enabled(flags: &CapabilityFlags, name: &str) -> bool {
    flags.is_enabled(CapabilityKind::Resource, name)
}

/// URI templates for the enabled resource collections.
pub fn templates(flags: &CapabilityFlags) -> ListResourceTemplatesResult {
    let all = [
        (
            "entries",
            RawResourceTemplate::new(uri::ENTRY_TEMPLATE, "entry")
                .with_description("A journal entry with its tags")
                .with_mime_type(JSON_MIME),
        ),
        (
            "tags",
            RawResourceTemplate::new(uri::TAG_TEMPLATE, "tag")
                .with_description("A tag")
                .with_mime_type(JSON_MIME),
        ),
        (
            "videos",
            RawResourceTemplate::new(uri::VIDEO_TEMPLATE, "video")
                .with_description("A rendered year-in-review video"),
        ),
    ];

    ListResourceTemplatesResult::with_all_items(
        all.into_iter()
            .filter(|(capability, _)| enabled(flags, capability))
            .map(|(_, template)| template.no_annotation())
            .collect(),
    )
}

/// Every readable resource in the enabled collections.
pub async fn list<D: Database>(
    db: &D,
    flags: &CapabilityFlags,
) -> Result<ListResourcesResult, McpError> {
    let mut resources = Vec::new();

    if enabled(flags, "entries") {
        for entry in db.entries().list().await.map_err(map_db_error)? {
            resources.push(
                RawResource::new(uri::entry_uri(entry.id), entry.title)
                    .with_description(format!("Journal entry {}", entry.id))
                    .with_mime_type(JSON_MIME)
                    .no_annotation(),
            );
        }
    }

    if enabled(flags, "tags") {
        for tag in db.tags().list().await.map_err(map_db_error)? {
            let mut resource =
                RawResource::new(uri::tag_uri(tag.id), tag.name).with_mime_type(JSON_MIME);
            if let Some(description) = tag.description {
                resource = resource.with_description(description);
            }
            resources.push(resource.no_annotation());
        }
    }

    if enabled(flags, "videos") {
        for video in db.videos().list().await.map_err(map_db_error)? {
            resources.push(
                RawResource::new(uri::video_uri(&video.name), video.name)
                    .with_description(format!("Year in review {}", video.year))
                    .with_mime_type(video.mime_type)
                    .no_annotation(),
            );
        }
    }

    Ok(ListResourcesResult::with_all_items(resources))
}

fn text_contents(uri: &str, value: &Value) -> Result<ReadResourceResult, McpError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| {
        McpError::internal_error(
            "serialization_error",
            Some(json!({"error": e.to_string()})),
        )
    })?;
    Ok(ReadResourceResult::new(vec![
        ResourceContents::text(text, uri).with_mime_type(JSON_MIME),
    ]))
}

/// Read one resource by URI.
pub async fn read<D: Database>(
    db: &D,
    flags: &CapabilityFlags,
    uri: &str,
) -> Result<ReadResourceResult, McpError> {
    let parsed = uri::parse(uri).ok_or_else(|| {
        McpError::invalid_params("unknown_resource", Some(json!({ "uri": uri })))
    })?;
    if !enabled(flags, parsed.capability()) {
        return Err(McpError::invalid_params(
            "resource_unavailable",
            Some(json!({ "uri": uri, "capability": parsed.capability() })),
        ));
    }

    match parsed {
        ResourceUri::Entry(id) => {
            let entry = db.entries().get(id).await.map_err(map_db_error)?;
            let tags = db.entries().tags_for(id).await.map_err(map_db_error)?;
            let mut value = json!(entry);
            value["tags"] = json!(tags);
            text_contents(uri, &value)
        }
        ResourceUri::Tag(id) => {
            let tag = db.tags().get(id).await.map_err(map_db_error)?;
            text_contents(uri, &json!(tag))
        }
        ResourceUri::Video(name) => {
            let video = db.videos().get(&name).await.map_err(map_db_error)?;
            let bytes = tokio::fs::read(&video.path).await.map_err(|e| {
                McpError::internal_error(
                    "video_unreadable",
                    Some(json!({ "uri": uri, "error": e.to_string() })),
                )
            })?;
            Ok(ReadResourceResult::new(vec![
                ResourceContents::blob(STANDARD.encode(bytes), uri).with_mime_type(video.mime_type),
            ]))
        }
    }
}
