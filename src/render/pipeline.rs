//! Render pipeline: statistics, artifact production and registration.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::job::{JobState, RenderJob};
use super::timeline::{Timeline, YearStats};
use super::{RenderConfig, RenderError, ffmpeg, progress};
use crate::db::utils::{current_timestamp, year_bounds};
use crate::db::{Database, EntryRepository, TagRepository, Video, VideoRepository};
use crate::mcp::uri::video_uri;

/// Number of equal increments a simulated render reports.
pub const SIMULATED_STEPS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Write the timeline as JSON and pace progress over `duration`.
    Simulated { duration: Duration },
    /// Encode an mp4 with the configured ffmpeg.
    Ffmpeg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRequest {
    pub year: i32,
    pub mode: RenderMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Succeeded { video: Video, uri: String },
    Cancelled,
    Failed { exit_code: Option<i32> },
}

/// How an artifact producer finished.
enum Produced {
    Completed,
    Cancelled,
    Failed { exit_code: Option<i32> },
}

/// Render the year in review for `request.year`.
///
/// `on_progress` receives strictly increasing fractions in `(0, 1]` and is
/// never called once cancellation has been observed. On success it has
/// received exactly `1.0` before this returns.
pub async fn render_wrapped<D, F>(
    db: &D,
    config: &RenderConfig,
    request: RenderRequest,
    cancel: CancellationToken,
    on_progress: F,
) -> Result<RenderOutcome, RenderError>
where
    D: Database,
    F: Fn(f64) + Send + Sync,
{
    let mut job = RenderJob::new(cancel);
    if job.is_cancelled() {
        job.transition(JobState::Cancelled)?;
        return Ok(RenderOutcome::Cancelled);
    }

    let timeline = build_timeline(db, request.year, config.total_seconds).await?;

    tokio::fs::create_dir_all(&config.videos_dir).await?;
    let name = format!("wrapped-{}-{}", request.year, job.id());
    let (extension, mime_type) = match request.mode {
        RenderMode::Simulated { .. } => ("json", "application/json"),
        RenderMode::Ffmpeg => ("mp4", "video/mp4"),
    };
    let path = config.videos_dir.join(format!("{}.{}", name, extension));

    job.transition(JobState::Running)?;
    info!(job = job.id(), year = request.year, mode = ?request.mode, "Render started");

    let produced = match request.mode {
        RenderMode::Simulated { duration } => {
            simulate(&mut job, &timeline, &path, duration, &on_progress).await
        }
        RenderMode::Ffmpeg => encode(&mut job, &config.ffmpeg, &timeline, &path, &on_progress).await,
    };

    let produced = match produced {
        Ok(produced) => produced,
        Err(e) => {
            remove_partial(&path).await;
            job.transition(JobState::Failed)?;
            return Err(e);
        }
    };

    // Cancellation wins over a producer that finished at the same time.
    let produced = match produced {
        Produced::Completed if job.is_cancelled() => Produced::Cancelled,
        other => other,
    };

    match produced {
        Produced::Completed => {
            if let Some(p) = job.advance(1.0) {
                on_progress(p);
            }

            let video = Video {
                name: name.clone(),
                path: path.to_string_lossy().into_owned(),
                year: request.year,
                mime_type: mime_type.to_string(),
                created_at: current_timestamp(),
            };
            if let Err(e) = db.videos().create(&video).await {
                remove_partial(&path).await;
                job.transition(JobState::Failed)?;
                return Err(e.into());
            }

            job.transition(JobState::Succeeded)?;
            info!(job = job.id(), video = %name, "Render succeeded");
            Ok(RenderOutcome::Succeeded {
                uri: video_uri(&name),
                video,
            })
        }
        Produced::Cancelled => {
            remove_partial(&path).await;
            job.transition(JobState::Cancelled)?;
            info!(job = job.id(), "Render cancelled");
            Ok(RenderOutcome::Cancelled)
        }
        Produced::Failed { exit_code } => {
            remove_partial(&path).await;
            job.transition(JobState::Failed)?;
            warn!(job = job.id(), ?exit_code, "Render failed");
            Ok(RenderOutcome::Failed { exit_code })
        }
    }
}

async fn build_timeline<D: Database>(
    db: &D,
    year: i32,
    total_seconds: f64,
) -> Result<Timeline, RenderError> {
    let (start, end) = year_bounds(year).ok_or(RenderError::InvalidYear { year })?;
    let entries = db.entries().created_between(start, end).await?;
    let tags = db.tags().created_between(start, end).await?;

    let stats = YearStats::collect(year, &entries, &tags);
    debug!(year, entries = stats.entry_count, tags = stats.tag_count, "Collected year stats");
    Ok(Timeline::from_stats(&stats, total_seconds))
}

fn report<F: Fn(f64)>(job: &mut RenderJob, on_progress: &F, fraction: f64) {
    if let Some(p) = job.advance(fraction) {
        on_progress(p);
    }
}

async fn simulate<F: Fn(f64) + Send + Sync>(
    job: &mut RenderJob,
    timeline: &Timeline,
    path: &Path,
    duration: Duration,
    on_progress: &F,
) -> Result<Produced, RenderError> {
    let artifact = serde_json::to_vec_pretty(timeline)?;
    tokio::fs::write(path, artifact).await?;

    let cancel = job.cancel_token().clone();
    let pause = duration / SIMULATED_STEPS;
    for step in 1..=SIMULATED_STEPS {
        if cancel.is_cancelled() {
            return Ok(Produced::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(Produced::Cancelled),
            _ = tokio::time::sleep(pause) => {}
        }
        report(job, on_progress, f64::from(step) / f64::from(SIMULATED_STEPS));
    }
    Ok(Produced::Completed)
}

async fn encode<F: Fn(f64) + Send + Sync>(
    job: &mut RenderJob,
    program: &str,
    timeline: &Timeline,
    path: &Path,
    on_progress: &F,
) -> Result<Produced, RenderError> {
    let args = ffmpeg::command_args(timeline, path);
    debug!(program, ?args, "Spawning renderer");

    let mut child = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| RenderError::Spawn {
            program: program.to_string(),
            message: e.to_string(),
        })?;

    let cancel = job.cancel_token().clone();
    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    kill(&mut child).await;
                    return Ok(Produced::Cancelled);
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(position) = progress::parse_progress_line(&line) {
                            let fraction = progress::fraction(position, timeline.total_seconds);
                            report(job, on_progress, fraction);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "Lost renderer progress stream");
                        break;
                    }
                }
            }
        }
    }

    let status = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            kill(&mut child).await;
            return Ok(Produced::Cancelled);
        }
        status = child.wait() => status?,
    };

    if status.success() {
        Ok(Produced::Completed)
    } else {
        Ok(Produced::Failed {
            exit_code: status.code(),
        })
    }
}

async fn kill(child: &mut tokio::process::Child) {
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "Renderer already exited");
    }
    if let Err(e) = child.wait().await {
        warn!(error = %e, "Failed to reap renderer");
    }
}

/// Best-effort removal of an unfinished artifact.
async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial artifact"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial artifact"),
    }
}
