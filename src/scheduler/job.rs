use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    /// Never stored on a job. In-flight work is reported by
    /// [`JobRunner::in_flight`](crate::scheduler::JobRunner::in_flight).
    Running,
    Finished,
    Canceled,
    Errored,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Canceled | JobStatus::Errored
        )
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => JobStatus::Waiting,
            1 => JobStatus::Running,
            2 => JobStatus::Finished,
            3 => JobStatus::Canceled,
            4 => JobStatus::Errored,
            // Only `JobState` writes the cell, always from a `JobStatus`.
            other => unreachable!("invalid job status value {other}"),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Waiting => write!(f, "waiting"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Finished => write!(f, "finished"),
            JobStatus::Canceled => write!(f, "canceled"),
            JobStatus::Errored => write!(f, "errored"),
        }
    }
}

/// Lifecycle status of a single job.
///
/// Starts at `Waiting` and moves to exactly one terminal status. Once terminal,
/// every further transition is refused.
#[derive(Debug)]
pub struct JobState {
    status: AtomicU8,
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}

impl JobState {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(JobStatus::Waiting as u8),
        }
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn finish(&self) -> bool {
        self.settle(JobStatus::Finished)
    }

    pub fn cancel(&self) -> bool {
        self.settle(JobStatus::Canceled)
    }

    pub fn error(&self) -> bool {
        self.settle(JobStatus::Errored)
    }

    /// Record `status` unless a terminal status is already recorded.
    ///
    /// Returns `true` if this call performed the transition. Non-terminal
    /// targets are refused.
    pub fn settle(&self, status: JobStatus) -> bool {
        if !status.is_terminal() {
            return false;
        }
        self.status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if JobStatus::from_u8(current).is_terminal() {
                    None
                } else {
                    Some(status as u8)
                }
            })
            .is_ok()
    }
}

/// A unit of asynchronous work driven by a [`JobRunner`](crate::scheduler::JobRunner).
///
/// Implementors supply [`run`](Job::run) and expose their [`JobState`]. The
/// hooks are called by the runner exactly once after `run` resolves; override
/// them to add side effects such as persistence, and call the default
/// behavior (or the matching [`JobState`] method) to record the status.
///
/// Blocking work inside `run` belongs on `tokio::task::spawn_blocking` or a
/// child process so the scheduler threads stay free.
#[async_trait]
pub trait Job: Send + Sync {
    fn state(&self) -> &JobState;

    async fn run(&self) -> Result<()>;

    fn status(&self) -> JobStatus {
        self.state().status()
    }

    /// Name used in log fields.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn on_finished(&self) -> Result<()> {
        self.state().finish();
        Ok(())
    }

    async fn on_canceled(&self) -> Result<()> {
        self.state().cancel();
        Ok(())
    }

    async fn on_errored(&self) -> Result<()> {
        self.state().error();
        Ok(())
    }
}
