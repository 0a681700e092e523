//! Year-in-review video tools

use std::sync::Arc;
use std::time::Duration;

use rmcp::{
    ErrorData as McpError, RoleServer,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars,
    schemars::JsonSchema,
    service::RequestContext,
    tool, tool_router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::db::utils::{current_timestamp, year_of};
use crate::db::{Database, VideoRepository};
use crate::mcp::client::ClientChannel;
use crate::mcp::tools::{json_result, map_db_error};
use crate::mcp::uri::video_uri;
use crate::render::{RenderConfig, RenderError, RenderOutcome, RenderRequest, render_wrapped};

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct CreateWrappedVideoParams {
    #[schemars(description = "Year to review (defaults to the current year)")]
    pub year: Option<i32>,
    #[schemars(
        description = "Simulate the render over this many milliseconds instead of running ffmpeg"
    )]
    pub mock_time_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetVideoParams {
    #[schemars(description = "Video name, e.g. wrapped-2025-1a2b3c-0")]
    pub name: String,
}

/// Rendering and lookup of "wrapped" videos.
pub struct VideoTools<D: Database> {
    db: Arc<D>,
    channel: Arc<dyn ClientChannel>,
    config: Arc<RenderConfig>,
    tool_router: ToolRouter<Self>,
}

impl<D: Database> Clone for VideoTools<D> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            channel: Arc::clone(&self.channel),
            config: Arc::clone(&self.config),
            tool_router: self.tool_router.clone(),
        }
    }
}

fn render_error(e: RenderError) -> McpError {
    let data = Some(json!({"error": e.to_string()}));
    match e {
        RenderError::InvalidYear { .. } => McpError::invalid_params("invalid_year", data),
        RenderError::Db(e) => map_db_error(e),
        _ => McpError::internal_error("render_error", data),
    }
}

fn outcome_error(body: serde_json::Value) -> CallToolResult {
    CallToolResult::error(vec![Content::text(body.to_string())])
}

#[tool_router]
impl<D: Database + 'static> VideoTools<D> {
    pub fn new(db: Arc<D>, channel: Arc<dyn ClientChannel>, config: Arc<RenderConfig>) -> Self {
        Self {
            db,
            channel,
            config,
            tool_router: Self::tool_router(),
        }
    }

    /// Get the tool router for this handler
    pub fn router(&self) -> &ToolRouter<Self> {
        &self.tool_router
    }

    /// Run a render, forwarding progress to the client when a token is given.
    pub async fn render(
        &self,
        params: CreateWrappedVideoParams,
        progress_token: Option<ProgressToken>,
        cancel: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let year = match params.year {
            Some(year) => year,
            None => year_of(current_timestamp()).ok_or_else(|| {
                McpError::internal_error("clock_error", Some(json!({"error": "no current year"})))
            })?,
        };
        let request = RenderRequest {
            year,
            mode: self
                .config
                .mode_for(params.mock_time_ms.map(Duration::from_millis)),
        };
        info!(year, mode = ?request.mode, "Starting wrapped video render");

        let (tx, mut rx) = mpsc::unbounded_channel::<f64>();
        let on_progress = move |fraction: f64| {
            let _ = tx.send(fraction);
        };

        // The sender lives in the render future, so the forwarder ends with it.
        let forward = async {
            while let Some(fraction) = rx.recv().await {
                let Some(token) = progress_token.clone() else {
                    debug!(year, progress = fraction, "Render progress");
                    continue;
                };
                let message = format!("Rendering {}: {:.0}%", year, fraction * 100.0);
                if let Err(e) = self
                    .channel
                    .progress(token, fraction, 1.0, Some(message))
                    .await
                {
                    warn!(error = %e, "Failed to send progress notification");
                }
            }
        };

        let (outcome, ()) = tokio::join!(
            render_wrapped(&*self.db, &self.config, request, cancel, on_progress),
            forward
        );

        match outcome.map_err(render_error)? {
            RenderOutcome::Succeeded { video, uri } => json_result(&json!({
                "outcome": "succeeded",
                "uri": uri,
                "video": video,
            })),
            RenderOutcome::Cancelled => Ok(outcome_error(json!({
                "outcome": "cancelled",
                "message": format!("Rendering {} was cancelled", year),
            }))),
            RenderOutcome::Failed { exit_code } => Ok(outcome_error(json!({
                "outcome": "failed",
                "exit_code": exit_code,
                "message": format!("Renderer exited unsuccessfully while rendering {}", year),
            }))),
        }
    }

    #[tool(
        description = "Render a year-in-review video of the journal. Reports progress and can be cancelled."
    )]
    pub async fn create_wrapped_video(
        &self,
        params: Parameters<CreateWrappedVideoParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let token = context.meta.get_progress_token();
        self.render(params.0, token, context.ct.clone()).await
    }

    #[tool(description = "Get a rendered video by name")]
    pub async fn get_video(
        &self,
        params: Parameters<GetVideoParams>,
    ) -> Result<CallToolResult, McpError> {
        let video = self
            .db
            .videos()
            .get(&params.0.name)
            .await
            .map_err(map_db_error)?;
        json_result(&json!({
            "uri": video_uri(&video.name),
            "video": video,
        }))
    }
}
