use std::time::Duration;

use crate::error::{JobError, Result};

const DEFAULT_MAX_CONCURRENCY: usize = 8;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Configuration for a [`JobRunner`](crate::scheduler::JobRunner).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Upper bound on simultaneously in-flight jobs. Must be positive.
    pub max_concurrency: usize,
    /// Idle back-off after a poll that returned no job.
    pub poll_interval_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl RunnerConfig {
    pub fn new(max_concurrency: usize, poll_interval_ms: u64) -> Self {
        Self {
            max_concurrency,
            poll_interval_ms,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(poll_interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject settings the runner cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(JobError::InvalidConfig(
                "max_concurrency must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
