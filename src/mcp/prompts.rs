//! Prompt templates.

use rmcp::{
    ErrorData as McpError,
    model::{
        GetPromptResult, JsonObject, ListPromptsResult, Prompt, PromptArgument, PromptMessage,
        PromptMessageRole,
    },
};
use serde_json::{Value, json};

use super::capabilities::{CapabilityFlags, CapabilityKind};
use super::suggest::suggest_tags_prompt;
use super::tools::map_db_error;
use crate::db::{Database, EntryRepository, Id, TagRepository};

pub const SUGGEST_TAGS: &str = "suggest_tags";
pub const SUMMARIZE_JOURNAL_ENTRIES: &str = "summarize_journal_entries";

struct PromptSpec {
    name: &'static str,
    description: &'static str,
    arguments: &'static [(&'static str, &'static str)],
}

const PROMPTS: &[PromptSpec] = &[
    PromptSpec {
        name: SUGGEST_TAGS,
        description: "Suggest tags for a journal entry",
        arguments: &[("entry_id", "ID of the entry to tag")],
    },
    PromptSpec {
        name: SUMMARIZE_JOURNAL_ENTRIES,
        description: "Summarize the journal so far",
        arguments: &[],
    },
];

/// Enabled prompts.
pub fn list(flags: &CapabilityFlags) -> ListPromptsResult {
    let prompts = PROMPTS
        .iter()
        .filter(|p| flags.is_enabled(CapabilityKind::Prompt, p.name))
        .map(|p| {
            let arguments = p
                .arguments
                .iter()
                .map(|(name, description)| {
                    PromptArgument::new(*name)
                        .with_description(*description)
                        .with_required(true)
                })
                .collect();
            Prompt::new(p.name, Some(p.description), Some(arguments))
        })
        .collect();

    ListPromptsResult::with_all_items(prompts)
}

fn user_message(description: &str, text: String) -> GetPromptResult {
    GetPromptResult::new(vec![PromptMessage::new_text(PromptMessageRole::User, text)])
        .with_description(description)
}

/// Clients send prompt arguments as strings; accept numbers too.
fn id_argument(arguments: Option<&JsonObject>, name: &str) -> Result<Id, McpError> {
    let value = arguments.and_then(|args| args.get(name));
    let parsed = match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        McpError::invalid_params(
            "invalid_argument",
            Some(json!({ "argument": name, "expected": "integer id" })),
        )
    })
}

/// Render an enabled prompt.
pub async fn get<D: Database>(
    db: &D,
    flags: &CapabilityFlags,
    name: &str,
    arguments: Option<&JsonObject>,
) -> Result<GetPromptResult, McpError> {
    if !flags.is_enabled(CapabilityKind::Prompt, name) {
        return Err(McpError::invalid_params(
            "prompt_unavailable",
            Some(json!({ "name": name })),
        ));
    }

    match name {
        SUGGEST_TAGS => {
            let entry_id = id_argument(arguments, "entry_id")?;
            let entry = db.entries().get(entry_id).await.map_err(map_db_error)?;
            let tags = db.tags().list().await.map_err(map_db_error)?;
            Ok(user_message(
                "Suggest tags for a journal entry",
                format!(
                    "{}\n\nAdd the tags you pick with the add_tag_to_entry tool, creating missing ones with create_tag first.",
                    suggest_tags_prompt(&entry, &tags)
                ),
            ))
        }
        SUMMARIZE_JOURNAL_ENTRIES => {
            let entries = db.entries().list().await.map_err(map_db_error)?;
            let tags = db.tags().list().await.map_err(map_db_error)?;
            let body = json!({ "entries": entries, "tags": tags });
            let body = serde_json::to_string_pretty(&body).map_err(|e| {
                McpError::internal_error(
                    "serialization_error",
                    Some(json!({"error": e.to_string()})),
                )
            })?;
            Ok(user_message(
                "Summarize the journal so far",
                format!(
                    "Here are my journal entries and tags:\n\n{}\n\nWrite a short, friendly summary of what I have been up to, grouped by theme.",
                    body
                ),
            ))
        }
        _ => Err(McpError::invalid_params(
            "unknown_prompt",
            Some(json!({ "name": name })),
        )),
    }
}
