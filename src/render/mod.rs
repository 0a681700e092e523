//! "Wrapped" year-in-review rendering.
//!
//! # Architecture
//!
//! - `timeline`: Year statistics and the deterministic slide layout
//! - `job`: Render job state machine and monotonic progress
//! - `progress`: ffmpeg progress stream parsing
//! - `ffmpeg`: Timeline to ffmpeg argument compilation
//! - `pipeline`: Simulated and ffmpeg-backed render runs with cancellation

pub mod ffmpeg;
pub mod job;
pub mod pipeline;
pub mod progress;
pub mod timeline;


use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::db::DbError;
pub use job::{JobState, RenderJob};
pub use pipeline::{RenderMode, RenderOutcome, RenderRequest, render_wrapped};
pub use timeline::{Slide, Timeline, YearStats};

/// Render errors. Cancellation and process failure are outcomes, not errors.
#[derive(Error, Diagnostic, Debug)]
pub enum RenderError {
    #[error("Year {year} is out of range")]
    #[diagnostic(code(epicme::render::invalid_year))]
    InvalidYear { year: i32 },

    #[error("Failed to start {program}: {message}")]
    #[diagnostic(
        code(epicme::render::spawn),
        help("Install ffmpeg, pass --ffmpeg, or use --simulate")
    )]
    Spawn { program: String, message: String },

    #[error("Render I/O error: {0}")]
    #[diagnostic(code(epicme::render::io))]
    Io(#[from] std::io::Error),

    #[error("Failed to write timeline: {0}")]
    #[diagnostic(code(epicme::render::serialize))]
    Serialize(#[from] serde_json::Error),

    #[error("Render job cannot move from {from} to {to}")]
    #[diagnostic(code(epicme::render::invalid_transition))]
    InvalidTransition { from: JobState, to: JobState },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Db(#[from] DbError),
}

/// Default length of a simulated render.
pub const DEFAULT_SIMULATED_DURATION: Duration = Duration::from_secs(3);

/// Server-wide render settings.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub videos_dir: PathBuf,
    pub ffmpeg: String,
    /// Length of the rendered timeline.
    pub total_seconds: f64,
    /// Render every video in simulated mode.
    pub simulate: bool,
}

impl RenderConfig {
    pub fn new(videos_dir: impl Into<PathBuf>) -> Self {
        Self {
            videos_dir: videos_dir.into(),
            ffmpeg: "ffmpeg".to_string(),
            total_seconds: 30.0,
            simulate: false,
        }
    }

    /// Mode for a call, honouring a per-call simulated duration.
    pub fn mode_for(&self, mock_time: Option<Duration>) -> RenderMode {
        match mock_time {
            Some(duration) => RenderMode::Simulated { duration },
            None if self.simulate => RenderMode::Simulated {
                duration: DEFAULT_SIMULATED_DURATION,
            },
            None => RenderMode::Ffmpeg,
        }
    }
}
