//! Entry tool implementations
//!
//! Handles all MCP tools for journal entry operations.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars,
    schemars::JsonSchema,
    tool, tool_router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::db::{Database, Entry, EntryPatch, EntryRepository, Id, NewEntry, TagRepository};
use crate::mcp::client::ClientChannel;
use crate::mcp::suggest::suggest_tags;
use crate::mcp::tools::{confirm, declined, json_result, map_db_error};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateEntryParams {
    #[schemars(description = "Entry title")]
    pub title: String,
    #[schemars(description = "Entry body")]
    pub content: String,
    #[schemars(description = "IDs of existing tags to attach (optional)")]
    pub tags: Option<Vec<Id>>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EntryIdParams {
    #[schemars(description = "Entry ID")]
    pub id: Id,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateEntryParams {
    #[schemars(description = "Entry ID")]
    pub id: Id,
    #[schemars(description = "New title")]
    pub title: Option<String>,
    #[schemars(description = "New content")]
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddTagToEntryParams {
    #[schemars(description = "Entry ID")]
    pub entry_id: Id,
    #[schemars(description = "Tag ID")]
    pub tag_id: Id,
}

/// When model tag suggestions run after `create_entry`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagSuggestions {
    /// Spawned; the tool returns without waiting.
    #[default]
    Background,
    /// Awaited before the tool returns.
    Inline,
    Disabled,
}

/// Journal entry tools
///
/// Generic over `D: Database` for zero-cost abstraction.
pub struct EntryTools<D: Database> {
    db: Arc<D>,
    channel: Arc<dyn ClientChannel>,
    suggestions: TagSuggestions,
    tool_router: ToolRouter<Self>,
}

// Shares the database handle, so `D` itself need not be `Clone`.
impl<D: Database> Clone for EntryTools<D> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            channel: Arc::clone(&self.channel),
            suggestions: self.suggestions,
            tool_router: self.tool_router.clone(),
        }
    }
}

#[tool_router]
impl<D: Database + 'static> EntryTools<D> {
    pub fn new(db: Arc<D>, channel: Arc<dyn ClientChannel>) -> Self {
        Self {
            db,
            channel,
            suggestions: TagSuggestions::default(),
            tool_router: Self::tool_router(),
        }
    }

    pub fn with_suggestions(mut self, suggestions: TagSuggestions) -> Self {
        self.suggestions = suggestions;
        self
    }

    /// Get the tool router for this handler
    pub fn router(&self) -> &ToolRouter<Self> {
        &self.tool_router
    }

    async fn with_tags(&self, entry: Entry) -> Result<serde_json::Value, McpError> {
        let tags = self
            .db
            .entries()
            .tags_for(entry.id)
            .await
            .map_err(map_db_error)?;
        let mut value = serde_json::to_value(&entry).map_err(|e| {
            McpError::internal_error(
                "serialization_error",
                Some(json!({"error": e.to_string()})),
            )
        })?;
        value["tags"] = json!(tags);
        Ok(value)
    }

    async fn run_suggestions(&self, entry_id: Id) {
        match self.suggestions {
            TagSuggestions::Background => {
                let db = Arc::clone(&self.db);
                let channel = Arc::clone(&self.channel);
                tokio::spawn(async move {
                    suggest_tags(db, channel, entry_id).await;
                });
            }
            TagSuggestions::Inline => {
                suggest_tags(Arc::clone(&self.db), Arc::clone(&self.channel), entry_id).await;
            }
            TagSuggestions::Disabled => debug!(entry_id, "Tag suggestions disabled"),
        }
    }

    #[tool(
        description = "Create a journal entry. Optionally attach existing tags by ID; more tags may be suggested and attached automatically afterwards."
    )]
    pub async fn create_entry(
        &self,
        params: Parameters<CreateEntryParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let tag_ids = params.tags.unwrap_or_default();

        // Unknown tags fail the call before anything is written.
        for &tag_id in &tag_ids {
            self.db.tags().get(tag_id).await.map_err(map_db_error)?;
        }

        let created = self
            .db
            .entries()
            .create(&NewEntry {
                title: params.title,
                content: params.content,
                created_at: None,
            })
            .await
            .map_err(map_db_error)?;

        if !tag_ids.is_empty() {
            self.db
                .entries()
                .add_tags(created.id, &tag_ids)
                .await
                .map_err(map_db_error)?;
        }

        let entry = self
            .db
            .entries()
            .get(created.id)
            .await
            .map_err(map_db_error)?;
        let body = self.with_tags(entry).await?;

        self.run_suggestions(created.id).await;

        json_result(&body)
    }

    #[tool(description = "Get a journal entry by ID, including its tags")]
    pub async fn get_entry(
        &self,
        params: Parameters<EntryIdParams>,
    ) -> Result<CallToolResult, McpError> {
        let entry = self
            .db
            .entries()
            .get(params.0.id)
            .await
            .map_err(map_db_error)?;
        json_result(&self.with_tags(entry).await?)
    }

    #[tool(description = "List all journal entries, oldest first")]
    pub async fn list_entries(&self) -> Result<CallToolResult, McpError> {
        let entries = self.db.entries().list().await.map_err(map_db_error)?;
        json_result(&json!({
            "items": entries,
            "total": entries.len(),
        }))
    }

    #[tool(description = "Update a journal entry's title and/or content")]
    pub async fn update_entry(
        &self,
        params: Parameters<UpdateEntryParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let entry = self
            .db
            .entries()
            .update(
                params.id,
                &EntryPatch {
                    title: params.title,
                    content: params.content,
                },
            )
            .await
            .map_err(map_db_error)?;
        json_result(&self.with_tags(entry).await?)
    }

    #[tool(description = "Delete a journal entry. The user may be asked to confirm.")]
    pub async fn delete_entry(
        &self,
        params: Parameters<EntryIdParams>,
    ) -> Result<CallToolResult, McpError> {
        let id = params.0.id;
        let entry = self.db.entries().get(id).await.map_err(map_db_error)?;

        let question = format!("Delete the journal entry \"{}\"?", entry.title);
        if !confirm(self.channel.as_ref(), question).await {
            return declined(format!("Entry {} was not deleted", id));
        }

        let deleted = self.db.entries().delete(id).await.map_err(map_db_error)?;
        json_result(&json!({
            "success": true,
            "message": format!("Entry {} deleted successfully", id),
            "entry": deleted,
        }))
    }

    #[tool(description = "Attach an existing tag to a journal entry. Attaching twice is a no-op.")]
    pub async fn add_tag_to_entry(
        &self,
        params: Parameters<AddTagToEntryParams>,
    ) -> Result<CallToolResult, McpError> {
        let AddTagToEntryParams { entry_id, tag_id } = params.0;
        let linked = self
            .db
            .entries()
            .add_tag(entry_id, tag_id)
            .await
            .map_err(map_db_error)?;
        let entry = self.db.entries().get(entry_id).await.map_err(map_db_error)?;

        json_result(&json!({
            "linked": linked,
            "entry": self.with_tags(entry).await?,
        }))
    }
}
