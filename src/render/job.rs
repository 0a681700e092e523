//! Render job lifecycle.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::RenderError;
use crate::db::utils::current_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }

    fn can_advance_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Pending, JobState::Cancelled)
                | (JobState::Pending, JobState::Failed)
                | (JobState::Running, JobState::Succeeded)
                | (JobState::Running, JobState::Failed)
                | (JobState::Running, JobState::Cancelled)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

static NEXT_JOB: AtomicU64 = AtomicU64::new(1);

/// Unique within the process; the timestamp prefix keeps restarts apart.
fn next_job_id() -> String {
    format!(
        "{:x}-{}",
        current_timestamp(),
        NEXT_JOB.fetch_add(1, Ordering::Relaxed)
    )
}

/// One render, alive for the duration of one tool call.
#[derive(Debug)]
pub struct RenderJob {
    id: String,
    state: JobState,
    progress: f64,
    cancel: CancellationToken,
}

impl RenderJob {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            id: next_job_id(),
            state: JobState::Pending,
            progress: 0.0,
            cancel,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Move to `next`. States only move forward; none is entered twice.
    pub fn transition(&mut self, next: JobState) -> Result<(), RenderError> {
        if !self.state.can_advance_to(next) {
            return Err(RenderError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Record progress while running.
    ///
    /// Returns the value to report, or `None` when nothing should be sent:
    /// the job is not running, it was cancelled, or the value does not
    /// move progress forward.
    pub fn advance(&mut self, fraction: f64) -> Option<f64> {
        if self.state != JobState::Running || self.cancel.is_cancelled() || fraction.is_nan() {
            return None;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        if fraction <= self.progress {
            return None;
        }
        self.progress = fraction;
        Some(fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_only_move_forward() {
        let mut job = RenderJob::new(CancellationToken::new());
        assert_eq!(job.state(), JobState::Pending);

        job.transition(JobState::Running).unwrap();
        assert!(job.transition(JobState::Running).is_err());
        assert!(job.transition(JobState::Pending).is_err());

        job.transition(JobState::Succeeded).unwrap();
        for next in [
            JobState::Running,
            JobState::Failed,
            JobState::Cancelled,
            JobState::Succeeded,
        ] {
            assert!(matches!(
                job.transition(next),
                Err(RenderError::InvalidTransition { .. })
            ));
        }
        assert!(job.state().is_terminal());
    }

    #[test]
    fn progress_is_clamped_and_monotonic() {
        let mut job = RenderJob::new(CancellationToken::new());
        assert_eq!(job.advance(0.5), None);

        job.transition(JobState::Running).unwrap();
        assert_eq!(job.advance(-1.0), None);
        assert_eq!(job.advance(0.25), Some(0.25));
        assert_eq!(job.advance(0.25), None);
        assert_eq!(job.advance(0.1), None);
        assert_eq!(job.advance(f64::NAN), None);
        assert_eq!(job.advance(7.0), Some(1.0));
        assert_eq!(job.progress(), 1.0);
    }

    #[test]
    fn no_progress_after_cancellation() {
        let token = CancellationToken::new();
        let mut job = RenderJob::new(token.clone());
        job.transition(JobState::Running).unwrap();
        assert_eq!(job.advance(0.3), Some(0.3));

        token.cancel();

        assert!(job.is_cancelled());
        assert_eq!(job.advance(0.6), None);
        assert_eq!(job.progress(), 0.3);
    }

    #[test]
    fn job_ids_are_unique() {
        let a = RenderJob::new(CancellationToken::new());
        let b = RenderJob::new(CancellationToken::new());
        assert_ne!(a.id(), b.id());
    }
}
