//! MCP transports
//!
//! This module provides the Streamable HTTP service that can be integrated
//! with an Axum router, and the stdio runner.

use std::sync::Arc;

use miette::Diagnostic;
use rmcp::ServiceExt;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::db::Database;
use crate::render::RenderConfig;

use super::server::McpServer;

/// Errors from running a transport.
#[derive(Error, Diagnostic, Debug)]
pub enum ServeError {
    #[error("MCP session failed to initialize: {message}")]
    #[diagnostic(code(epicme::mcp::initialize))]
    Initialize { message: String },

    #[error("MCP session task failed: {0}")]
    #[diagnostic(code(epicme::mcp::session))]
    Session(#[from] tokio::task::JoinError),
}

/// Create MCP Streamable HTTP service
///
/// Every session gets its own [`McpServer`] with its own capability flags
/// and subscriptions over the shared database.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use axum::Router;
/// use tokio_util::sync::CancellationToken;
/// # use epicme::db::{Database, SqliteDatabase};
/// # use epicme::mcp::create_mcp_service;
/// # use epicme::render::RenderConfig;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let db = SqliteDatabase::in_memory().await?;
/// # db.migrate().await?;
///
/// let ct = CancellationToken::new();
/// let render = Arc::new(RenderConfig::new("/tmp/epicme-videos"));
/// let mcp_service = create_mcp_service(Arc::new(db), render, ct);
///
/// let app: Router = Router::new()
///     .nest_service("/mcp", mcp_service);
/// # Ok(())
/// # }
/// ```
pub fn create_mcp_service<D: Database + 'static>(
    db: Arc<D>,
    render: Arc<RenderConfig>,
    cancellation_token: CancellationToken,
) -> StreamableHttpService<McpServer<D>, LocalSessionManager> {
    // Service factory: creates new McpServer instance per session
    // Note: Returns io::Error to match rmcp's expected signature
    let service_factory = move || -> Result<McpServer<D>, std::io::Error> {
        Ok(McpServer::new(Arc::clone(&db), Arc::clone(&render)))
    };

    // Sessions carry flags and subscriptions
    let config = StreamableHttpServerConfig::default()
        .with_stateful_mode(true)
        .with_cancellation_token(cancellation_token);

    StreamableHttpService::new(
        service_factory,
        LocalSessionManager::default().into(),
        config,
    )
}

/// Serve a single session over stdin/stdout until the client disconnects
/// or `cancellation_token` fires.
pub async fn serve_stdio<D: Database + 'static>(
    db: Arc<D>,
    render: Arc<RenderConfig>,
    cancellation_token: CancellationToken,
) -> Result<(), ServeError> {
    let server = McpServer::new(db, render);
    let service = server
        .serve_with_ct(stdio(), cancellation_token)
        .await
        .map_err(|e| ServeError::Initialize {
            message: e.to_string(),
        })?;

    info!("MCP stdio session running");
    let reason = service.waiting().await?;
    info!(?reason, "MCP stdio session ended");
    Ok(())
}
