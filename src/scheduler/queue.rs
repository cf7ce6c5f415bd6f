use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::Result;
use crate::scheduler::job::Job;
use crate::scheduler::source::JobSource;

const DEFAULT_MAX_JOBS: usize = 10_000;

/// Bounded in-memory FIFO of jobs waiting for admission.
///
/// Producers may push from any thread; the runner pops from the front on
/// every poll.
pub struct JobQueue {
    jobs: Mutex<VecDeque<Arc<dyn Job>>>,
    max_jobs: usize,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("len", &self.len())
            .field("max_jobs", &self.max_jobs)
            .finish()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_JOBS)
    }

    pub fn with_capacity(max_jobs: usize) -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            max_jobs,
        }
    }

    /// Append a job. Returns false if the queue is at capacity.
    pub fn push(&self, job: Arc<dyn Job>) -> bool {
        let mut jobs = self.lock();
        if jobs.len() >= self.max_jobs {
            return false;
        }
        jobs.push_back(job);
        true
    }

    /// Remove and return the oldest job.
    pub fn pop(&self) -> Option<Arc<dyn Job>> {
        self.lock().pop_front()
    }

    /// Drop every waiting job. Returns the number of jobs removed.
    pub fn clear(&self) -> usize {
        let mut jobs = self.lock();
        let removed = jobs.len();
        jobs.clear();
        removed
    }

    /// Returns the current number of waiting jobs
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no job is waiting
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns true if the queue is at capacity
    pub fn is_full(&self) -> bool {
        self.lock().len() >= self.max_jobs
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Arc<dyn Job>>> {
        // A producer panicking mid-push leaves the deque itself consistent.
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl JobSource for JobQueue {
    async fn poll(&self) -> Result<Option<Arc<dyn Job>>> {
        Ok(self.pop())
    }
}
