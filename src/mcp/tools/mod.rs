//! MCP tool implementations
//!
//! This module contains tool handlers organized by entity type.
//! Each module follows Single Responsibility Principle (SRP).

mod entries;
mod tags;
mod video;


pub use entries::{EntryTools, TagSuggestions};
pub use tags::TagTools;
pub use video::VideoTools;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content, ElicitationSchema},
};
use serde::Serialize;
use serde_json::json;

use crate::db::DbError;
use crate::mcp::client::{ClientChannel, ElicitationAction, ElicitationRequest};

/// Convert a storage error into an MCP error.
pub fn map_db_error(e: DbError) -> McpError {
    let data = Some(json!({"error": e.to_string()}));
    match e {
        DbError::NotFound { .. } => McpError::resource_not_found("not_found", data),
        DbError::AlreadyExists { .. } => McpError::invalid_params("already_exists", data),
        DbError::Validation { .. } => McpError::invalid_params("validation_error", data),
        DbError::Constraint { .. } => McpError::invalid_params("constraint_violation", data),
        _ => McpError::internal_error("database_error", data),
    }
}

/// Successful result with a pretty-printed JSON body.
pub fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let content = serde_json::to_string_pretty(value).map_err(|e| {
        McpError::internal_error(
            "serialization_error",
            Some(json!({"error": e.to_string()})),
        )
    })?;
    Ok(CallToolResult::success(vec![Content::text(content)]))
}

/// Ask the user to confirm a destructive action.
///
/// Clients without elicitation support are not asked and the action proceeds.
/// Any failure to get an answer counts as "no".
pub(crate) async fn confirm(channel: &dyn ClientChannel, message: String) -> bool {
    if !channel.supports_elicitation() {
        return true;
    }

    let schema = match ElicitationSchema::builder()
        .required_bool_with("confirmed", |field| {
            field.title("Confirm").description("Check to confirm")
        })
        .build()
    {
        Ok(schema) => schema,
        Err(e) => {
            tracing::warn!(error = e, "Invalid confirmation schema");
            return false;
        }
    };
    let request = ElicitationRequest { message, schema };

    match channel.elicit(request).await {
        Ok(response) => {
            let confirmed = response.confirmed("confirmed");
            if !confirmed && response.action == ElicitationAction::Accept {
                tracing::debug!("Confirmation accepted without checking the box");
            }
            confirmed
        }
        Err(e) => {
            tracing::warn!(error = %e, "Confirmation request failed");
            false
        }
    }
}

/// Result for an action the user declined.
pub(crate) fn declined(message: String) -> Result<CallToolResult, McpError> {
    json_result(&json!({
        "success": false,
        "declined": true,
        "message": message,
    }))
}
