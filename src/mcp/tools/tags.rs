//! Tag tool implementations

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

use crate::db::{Database, Id, NewTag, TagPatch, TagRepository};
use crate::mcp::client::ClientChannel;
use crate::mcp::tools::{confirm, declined, json_result, map_db_error};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateTagParams {
    #[schemars(description = "Unique tag name")]
    pub name: String,
    #[schemars(description = "What the tag is for (optional)")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TagIdParams {
    #[schemars(description = "Tag ID")]
    pub id: Id,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateTagParams {
    #[schemars(description = "Tag ID")]
    pub id: Id,
    #[schemars(description = "New name")]
    pub name: Option<String>,
    #[schemars(description = "New description")]
    pub description: Option<String>,
}

/// Tag tools
pub struct TagTools<D: Database> {
    db: Arc<D>,
    channel: Arc<dyn ClientChannel>,
    tool_router: ToolRouter<Self>,
}

impl<D: Database> Clone for TagTools<D> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            channel: Arc::clone(&self.channel),
            tool_router: self.tool_router.clone(),
        }
    }
}

#[tool_router]
impl<D: Database + 'static> TagTools<D> {
    pub fn new(db: Arc<D>, channel: Arc<dyn ClientChannel>) -> Self {
        Self {
            db,
            channel,
            tool_router: Self::tool_router(),
        }
    }

    /// Get the tool router for this handler
    pub fn router(&self) -> &ToolRouter<Self> {
        &self.tool_router
    }

    #[tool(description = "Create a tag. Names are unique.")]
    pub async fn create_tag(
        &self,
        params: Parameters<CreateTagParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let tag = self
            .db
            .tags()
            .create(&NewTag {
                name: params.name,
                description: params.description,
                created_at: None,
            })
            .await
            .map_err(map_db_error)?;
        json_result(&tag)
    }

    #[tool(description = "Get a tag by ID")]
    pub async fn get_tag(
        &self,
        params: Parameters<TagIdParams>,
    ) -> Result<CallToolResult, McpError> {
        let tag = self
            .db
            .tags()
            .get(params.0.id)
            .await
            .map_err(map_db_error)?;
        json_result(&tag)
    }

    #[tool(description = "List all tags, by name")]
    pub async fn list_tags(&self) -> Result<CallToolResult, McpError> {
        let tags = self.db.tags().list().await.map_err(map_db_error)?;
        json_result(&json!({
            "items": tags,
            "total": tags.len(),
        }))
    }

    #[tool(description = "Update a tag's name and/or description")]
    pub async fn update_tag(
        &self,
        params: Parameters<UpdateTagParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let tag = self
            .db
            .tags()
            .update(
                params.id,
                &TagPatch {
                    name: params.name,
                    description: params.description,
                },
            )
            .await
            .map_err(map_db_error)?;
        json_result(&tag)
    }

    #[tool(
        description = "Delete a tag and detach it from every entry. The user may be asked to confirm."
    )]
    pub async fn delete_tag(
        &self,
        params: Parameters<TagIdParams>,
    ) -> Result<CallToolResult, McpError> {
        let id = params.0.id;
        let tag = self.db.tags().get(id).await.map_err(map_db_error)?;

        let question = format!("Delete the tag \"{}\"?", tag.name);
        if !confirm(self.channel.as_ref(), question).await {
            return declined(format!("Tag {} was not deleted", id));
        }

        let deleted = self.db.tags().delete(id).await.map_err(map_db_error)?;
        json_result(&json!({
            "success": true,
            "message": format!("Tag {} deleted successfully", id),
            "tag": deleted,
        }))
    }
}
