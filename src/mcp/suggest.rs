//! Model-generated tag suggestions.
//!
//! After an entry is created the client's model is asked (via sampling) for
//! tags. Its answer is untrusted text: [`parse_suggestions`] turns it into
//! [`TagSuggestion`] values, dropping anything malformed, and [`reconcile`]
//! applies them to storage as one creation pass plus one attach write.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use miette::Diagnostic;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::client::{ChannelError, ClientChannel, SamplingRequest};
use crate::db::{
    Database, DbError, Entry, EntryRepository, Id, NewTag, Tag, TagRepository,
};

/// Errors that abort a reconciliation. Nothing is applied when one occurs.
#[derive(Error, Diagnostic, Debug)]
pub enum ReconcileError {
    #[error("Suggestion is not valid JSON: {message}")]
    #[diagnostic(code(epicme::suggest::parse))]
    Parse { message: String },

    #[error("Suggestion must be a JSON array, got {found}")]
    #[diagnostic(code(epicme::suggest::schema_mismatch))]
    SchemaMismatch { found: &'static str },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Db(#[from] DbError),
}

/// One validated element of the model's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagSuggestion {
    Existing {
        id: Id,
    },
    New {
        name: String,
        description: Option<String>,
    },
}

// Existing is tried first so `{id, name}` is read as a reference.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSuggestion {
    Existing {
        id: Id,
    },
    New {
        name: String,
        #[serde(default)]
        description: Option<String>,
    },
}

impl From<RawSuggestion> for TagSuggestion {
    fn from(raw: RawSuggestion) -> Self {
        match raw {
            RawSuggestion::Existing { id } => TagSuggestion::Existing { id },
            RawSuggestion::New { name, description } => TagSuggestion::New {
                name,
                description: description
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty()),
            },
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Models like to wrap JSON in markdown fences.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse raw model text into suggestions.
pub fn parse_suggestions(text: &str) -> Result<Vec<TagSuggestion>, ReconcileError> {
    let value: Value =
        serde_json::from_str(strip_code_fence(text)).map_err(|e| ReconcileError::Parse {
            message: e.to_string(),
        })?;

    let Value::Array(items) = value else {
        return Err(ReconcileError::SchemaMismatch {
            found: json_kind(&value),
        });
    };

    let total = items.len();
    let suggestions: Vec<TagSuggestion> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawSuggestion>(item).ok())
        .map(TagSuggestion::from)
        .filter(|s| !matches!(s, TagSuggestion::New { name, .. } if name.trim().is_empty()))
        .collect();

    if suggestions.len() < total {
        debug!(
            dropped = total - suggestions.len(),
            "Dropped malformed tag suggestions"
        );
    }
    Ok(suggestions)
}

/// What a reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub created: Vec<Tag>,
    pub attached: Vec<Id>,
}

/// Apply suggestions to an entry.
///
/// Names exactly matching an existing tag become references to it (no case
/// folding or trimming). Duplicate new names collapse to one tag.
/// References to unknown or already attached tags are skipped.
pub async fn reconcile<D: Database>(
    db: &D,
    entry_id: Id,
    suggestions: Vec<TagSuggestion>,
) -> Result<ReconcileOutcome, ReconcileError> {
    let entry = db.entries().get(entry_id).await?;
    let existing = db.tags().list().await?;

    let by_name: BTreeMap<&str, Id> = existing.iter().map(|t| (t.name.as_str(), t.id)).collect();
    let known: BTreeSet<Id> = existing.iter().map(|t| t.id).collect();
    let attached: BTreeSet<Id> = entry.tag_ids.iter().copied().collect();

    let mut refs: Vec<Id> = Vec::new();
    let mut new_tags: Vec<(String, Option<String>)> = Vec::new();

    for suggestion in suggestions {
        let id = match suggestion {
            TagSuggestion::Existing { id } => id,
            TagSuggestion::New { name, description } => match by_name.get(name.as_str()) {
                Some(&id) => id,
                None => {
                    if !new_tags.iter().any(|(n, _)| *n == name) {
                        new_tags.push((name, description));
                    }
                    continue;
                }
            },
        };
        if known.contains(&id) && !attached.contains(&id) && !refs.contains(&id) {
            refs.push(id);
        }
    }

    let mut created = Vec::new();
    for (name, description) in new_tags {
        let new_tag = NewTag {
            name: name.clone(),
            description,
            created_at: None,
        };
        let id = match db.tags().create(&new_tag).await {
            Ok(tag) => {
                let id = tag.id;
                created.push(tag);
                id
            }
            // Created concurrently since we listed: use it.
            Err(DbError::AlreadyExists { .. }) => match db.tags().get_by_name(&name).await? {
                Some(tag) => tag.id,
                None => continue,
            },
            Err(e) => return Err(e.into()),
        };
        if !attached.contains(&id) && !refs.contains(&id) {
            refs.push(id);
        }
    }

    let attached = if refs.is_empty() {
        Vec::new()
    } else {
        db.entries().add_tags(entry_id, &refs).await?
    };

    Ok(ReconcileOutcome { created, attached })
}

pub const SUGGEST_TAGS_SYSTEM_PROMPT: &str = "You are a helpful assistant that suggests relevant \
tags for journal entries. Reply with JSON only: an array whose elements are either \
{\"id\": <existing tag id>} or {\"name\": \"<new tag>\", \"description\": \"<short description>\"}. \
Prefer existing tags, suggest at most 4, and never repeat tags the entry already has.";

/// User-facing instructions embedding the entry and the available tags.
pub fn suggest_tags_prompt(entry: &Entry, tags: &[Tag]) -> String {
    let entry_json = json!({
        "id": entry.id,
        "title": entry.title,
        "content": entry.content,
        "tag_ids": entry.tag_ids,
    });
    let tags_json: Vec<Value> = tags
        .iter()
        .map(|t| json!({ "id": t.id, "name": t.name, "description": t.description }))
        .collect();

    format!(
        "Suggest tags for this journal entry.\n\n\
         Entry:\n{}\n\n\
         Existing tags:\n{}\n\n\
         Respond with a JSON array of tag references or new tags.",
        serde_json::to_string_pretty(&entry_json).unwrap_or_default(),
        serde_json::to_string_pretty(&tags_json).unwrap_or_default(),
    )
}

/// Ask the client's model for tags and apply them.
///
/// Never fails: every problem is logged and leaves the entry as it was.
pub async fn suggest_tags<D: Database>(
    db: Arc<D>,
    channel: Arc<dyn ClientChannel>,
    entry_id: Id,
) -> Option<ReconcileOutcome> {
    let request = match build_request(&*db, entry_id).await {
        Ok(request) => request,
        Err(e) => {
            warn!(entry_id, error = %e, "Could not prepare tag suggestion request");
            return None;
        }
    };

    let text = match channel.create_message(request).await {
        Ok(text) => text,
        Err(ChannelError::Unsupported { .. } | ChannelError::NotConnected) => {
            debug!(entry_id, "Client cannot sample; skipping tag suggestions");
            return None;
        }
        Err(e) => {
            warn!(entry_id, error = %e, "Tag suggestion sampling failed");
            return None;
        }
    };

    let result = match parse_suggestions(&text) {
        Ok(suggestions) => reconcile(&*db, entry_id, suggestions).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => {
            info!(
                entry_id,
                created = outcome.created.len(),
                attached = outcome.attached.len(),
                "Applied tag suggestions"
            );
            Some(outcome)
        }
        Err(e) => {
            warn!(entry_id, error = %e, "Discarded tag suggestions");
            None
        }
    }
}

async fn build_request<D: Database>(db: &D, entry_id: Id) -> Result<SamplingRequest, DbError> {
    let entry = db.entries().get(entry_id).await?;
    let tags = db.tags().list().await?;
    Ok(SamplingRequest {
        system_prompt: SUGGEST_TAGS_SYSTEM_PROMPT.to_string(),
        prompt: suggest_tags_prompt(&entry, &tags),
        max_tokens: 200,
    })
}
