//! Process-level wiring: tracing, the HTTP router and the transports.

use std::net::IpAddr;
use std::sync::Arc;

use axum::{Json, Router, routing::get};
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::db::Database;
use crate::mcp::{self, ServeError};
use crate::render::RenderConfig;

#[derive(Error, Diagnostic, Debug)]
pub enum AppError {
    #[error("HTTP server error: {0}")]
    #[diagnostic(code(epicme::app::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Serve(#[from] ServeError),
}

/// HTTP transport configuration
pub struct HttpConfig {
    /// Host address to bind to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
        }
    }
}

/// Initialize tracing subscriber with env filter.
///
/// Logs go to stderr; stdout belongs to the stdio transport.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "epicme=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Router with the MCP endpoint at `/mcp` and a health check.
pub fn router<D: Database + 'static>(
    db: Arc<D>,
    render: Arc<RenderConfig>,
    ct: CancellationToken,
) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest_service("/mcp", mcp::create_mcp_service(db, render, ct))
        .layer(TraceLayer::new_for_http())
}

/// Cancel `ct` on Ctrl-C.
fn cancel_on_ctrl_c(ct: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            ct.cancel();
        }
    });
}

/// Serve MCP over Streamable HTTP until Ctrl-C.
pub async fn run_http<D: Database + 'static>(
    config: HttpConfig,
    db: Arc<D>,
    render: Arc<RenderConfig>,
) -> Result<(), AppError> {
    let ct = CancellationToken::new();
    cancel_on_ctrl_c(ct.clone());

    let app = router(db, render, ct.clone());
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("MCP server listening on http://{}/mcp", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { ct.cancelled_owned().await })
        .await?;
    Ok(())
}

/// Serve one MCP session over stdio until the client leaves or Ctrl-C.
pub async fn run_stdio<D: Database + 'static>(
    db: Arc<D>,
    render: Arc<RenderConfig>,
) -> Result<(), AppError> {
    let ct = CancellationToken::new();
    cancel_on_ctrl_c(ct.clone());
    mcp::serve_stdio(db, render, ct).await?;
    Ok(())
}
