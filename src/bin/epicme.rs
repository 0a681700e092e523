//! EpicMe MCP server binary.
//!
//! This binary creates the concrete database implementation and passes it
//! to the MCP layer, which stays agnostic of the storage backend.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use epicme::app::{self, AppError, HttpConfig};
use epicme::db::{Database, DbError, SqliteDatabase};
use epicme::paths;
use epicme::render::RenderConfig;
use miette::Diagnostic;
use thiserror::Error;
use tracing::info;

#[derive(Error, Diagnostic, Debug)]
enum BinaryError {
    #[error("Database error: {0}")]
    #[diagnostic(code(epicme::binary::database))]
    Database(#[from] DbError),

    #[error("Failed to create data directory: {0}")]
    #[diagnostic(code(epicme::binary::io))]
    Io(#[from] std::io::Error),

    #[error("Cannot determine a data directory")]
    #[diagnostic(
        code(epicme::binary::no_data_dir),
        help("Set HOME or XDG_DATA_HOME, or pass --db and --videos-dir")
    )]
    NoDataDir,

    #[error("--video-seconds must be a positive number, got {0}")]
    #[diagnostic(code(epicme::binary::video_seconds))]
    VideoSeconds(f64),

    #[error(transparent)]
    #[diagnostic(transparent)]
    App(#[from] AppError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

#[derive(Parser)]
#[command(name = "epicme")]
#[command(author, version, about = "EpicMe journal MCP server", long_about = None)]
struct Cli {
    /// Database file path (defaults to ~/.local/share/epicme/epicme.db)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Directory for rendered videos (defaults to ~/.local/share/epicme/videos)
    #[arg(long)]
    videos_dir: Option<PathBuf>,

    /// MCP transport
    #[arg(long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// Host address to bind to (http transport)
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to listen on (http transport)
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// ffmpeg program used for rendering
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: String,

    /// Length of a rendered year in review, in seconds
    #[arg(long, default_value = "30")]
    video_seconds: f64,

    /// Simulate renders instead of running ffmpeg
    #[arg(long)]
    simulate: bool,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    run().await.map_err(Into::into)
}

async fn run() -> Result<(), BinaryError> {
    let cli = Cli::parse();
    app::init_tracing();

    if !(cli.video_seconds.is_finite() && cli.video_seconds > 0.0) {
        return Err(BinaryError::VideoSeconds(cli.video_seconds));
    }

    let db_path = match cli.db {
        Some(path) => path,
        None => paths::db_path().ok_or(BinaryError::NoDataDir)?,
    };
    let videos_dir = match cli.videos_dir {
        Some(dir) => dir,
        None => paths::videos_dir().ok_or(BinaryError::NoDataDir)?,
    };

    info!(path = %db_path.display(), "Opening database");
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = SqliteDatabase::open(&db_path).await?;
    db.migrate().await?;
    info!("Database migrations complete");

    let render = Arc::new(RenderConfig {
        ffmpeg: cli.ffmpeg,
        total_seconds: cli.video_seconds,
        simulate: cli.simulate,
        ..RenderConfig::new(videos_dir)
    });
    let db = Arc::new(db);

    match cli.transport {
        Transport::Stdio => app::run_stdio(db, render).await?,
        Transport::Http => {
            app::run_http(
                HttpConfig {
                    host: cli.host,
                    port: cli.port,
                },
                db,
                render,
            )
            .await?
        }
    }

    Ok(())
}
