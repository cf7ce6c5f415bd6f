use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::scheduler::job::JobStatus;

/// Terminal result of one execution unit.
///
/// A unit interrupted by a hard shutdown resolves to `Canceled`; that is how
/// the cancellation reaches the runner's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Finished,
    Canceled,
    Errored,
}

impl JobOutcome {
    pub fn status(self) -> JobStatus {
        match self {
            JobOutcome::Finished => JobStatus::Finished,
            JobOutcome::Canceled => JobStatus::Canceled,
            JobOutcome::Errored => JobStatus::Errored,
        }
    }

    pub(crate) fn hook_name(self) -> &'static str {
        match self {
            JobOutcome::Finished => "on_finished",
            JobOutcome::Canceled => "on_canceled",
            JobOutcome::Errored => "on_errored",
        }
    }
}

/// Lifetime counters of a runner.
#[derive(Debug, Default)]
pub struct RunnerStats {
    admitted: AtomicU64,
    finished: AtomicU64,
    canceled: AtomicU64,
    errored: AtomicU64,
    poll_errors: AtomicU64,
    empty_polls: AtomicU64,
}

impl RunnerStats {
    pub(crate) fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_outcome(&self, outcome: JobOutcome) {
        let counter = match outcome {
            JobOutcome::Finished => &self.finished,
            JobOutcome::Canceled => &self.canceled,
            JobOutcome::Errored => &self.errored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_poll_error(&self) {
        self.poll_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_empty_poll(&self) {
        self.empty_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, in_flight: usize) -> StatsSnapshot {
        StatsSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            finished: self.finished.load(Ordering::Relaxed),
            canceled: self.canceled.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            in_flight,
        }
    }
}

/// Point-in-time copy of [`RunnerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub admitted: u64,
    pub finished: u64,
    pub canceled: u64,
    pub errored: u64,
    pub poll_errors: u64,
    pub empty_polls: u64,
    pub in_flight: usize,
}

impl StatsSnapshot {
    /// Admitted jobs that reached a terminal outcome.
    pub fn completed(&self) -> u64 {
        self.finished + self.canceled + self.errored
    }
}
