//! Shared jobs, sources and helpers for runner integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;

use job_runner::config::RunnerConfig;
use job_runner::error::{JobError, Result};
use job_runner::scheduler::{Job, JobQueue, JobRunner, JobSource, JobState};

/// Runner config used by most tests: short poll interval for fast tests.
pub fn test_config(max_concurrency: usize) -> RunnerConfig {
    RunnerConfig::new(max_concurrency, 100)
}

/// Runner over a shared queue, so tests can keep pushing after it starts.
pub fn queue_runner(max_concurrency: usize) -> (Arc<JobRunner<Arc<JobQueue>>>, Arc<JobQueue>) {
    let queue = Arc::new(JobQueue::new());
    let runner = JobRunner::with_config(Arc::clone(&queue), test_config(max_concurrency))
        .expect("valid test config");
    (Arc::new(runner), queue)
}

/// Push `jobs` from a separate OS thread, sleeping `delay` before each push.
pub fn add_jobs_thread(
    queue: Arc<JobQueue>,
    jobs: Vec<Arc<dyn Job>>,
    delay: Duration,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for job in jobs {
            std::thread::sleep(delay);
            assert!(queue.push(job), "test queue should not be full");
        }
    })
}

/// Poll until `condition` holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

// =============================================================================
// Jobs
// =============================================================================

/// Sleeps, then counts one completed run.
pub struct CountingJob {
    state: JobState,
    sleep: Duration,
    count: AtomicUsize,
}

impl CountingJob {
    pub fn new(sleep: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: JobState::new(),
            sleep,
            count: AtomicUsize::new(0),
        })
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Job for CountingJob {
    fn state(&self) -> &JobState {
        &self.state
    }

    async fn run(&self) -> Result<()> {
        tokio::time::sleep(self.sleep).await;
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fails immediately.
pub struct ErrorJob {
    state: JobState,
}

impl ErrorJob {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: JobState::new(),
        })
    }
}

#[async_trait]
impl Job for ErrorJob {
    fn state(&self) -> &JobState {
        &self.state
    }

    async fn run(&self) -> Result<()> {
        Err(JobError::failed("Test error"))
    }
}

/// Panics inside `run`.
pub struct PanicJob {
    state: JobState,
}

impl PanicJob {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: JobState::new(),
        })
    }
}

#[async_trait]
impl Job for PanicJob {
    fn state(&self) -> &JobState {
        &self.state
    }

    async fn run(&self) -> Result<()> {
        panic!("job exploded");
    }
}

/// Tracks how many instances are inside `run` at once.
#[derive(Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}

pub struct GaugeJob {
    state: JobState,
    gauge: Arc<Gauge>,
    sleep: Duration,
}

impl GaugeJob {
    pub fn new(gauge: &Arc<Gauge>, sleep: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: JobState::new(),
            gauge: Arc::clone(gauge),
            sleep,
        })
    }
}

#[async_trait]
impl Job for GaugeJob {
    fn state(&self) -> &JobState {
        &self.state
    }

    async fn run(&self) -> Result<()> {
        let now = self.gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.sleep).await;
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Which hook a [`HookJob`] sabotages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookFailure {
    None,
    /// Hook returns an error before recording any status.
    Error,
    /// Hook panics before recording any status.
    Panic,
}

/// Counts hook invocations; optionally fails them.
pub struct HookJob {
    state: JobState,
    outcome: std::result::Result<Duration, ()>,
    failure: HookFailure,
    pub finished_calls: AtomicUsize,
    pub canceled_calls: AtomicUsize,
    pub errored_calls: AtomicUsize,
}

impl HookJob {
    /// Succeeds after `sleep`.
    pub fn succeeding(sleep: Duration, failure: HookFailure) -> Arc<Self> {
        Self::build(Ok(sleep), failure)
    }

    /// Fails immediately.
    pub fn failing(failure: HookFailure) -> Arc<Self> {
        Self::build(Err(()), failure)
    }

    fn build(outcome: std::result::Result<Duration, ()>, failure: HookFailure) -> Arc<Self> {
        Arc::new(Self {
            state: JobState::new(),
            outcome,
            failure,
            finished_calls: AtomicUsize::new(0),
            canceled_calls: AtomicUsize::new(0),
            errored_calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> (usize, usize, usize) {
        (
            self.finished_calls.load(Ordering::SeqCst),
            self.canceled_calls.load(Ordering::SeqCst),
            self.errored_calls.load(Ordering::SeqCst),
        )
    }

    fn sabotage(&self) -> Result<()> {
        match self.failure {
            HookFailure::None => Ok(()),
            HookFailure::Error => Err(JobError::failed("hook storage unavailable")),
            HookFailure::Panic => panic!("hook exploded"),
        }
    }
}

#[async_trait]
impl Job for HookJob {
    fn state(&self) -> &JobState {
        &self.state
    }

    async fn run(&self) -> Result<()> {
        match self.outcome {
            Ok(sleep) => {
                tokio::time::sleep(sleep).await;
                Ok(())
            }
            Err(()) => Err(JobError::failed("planned failure")),
        }
    }

    async fn on_finished(&self) -> Result<()> {
        self.finished_calls.fetch_add(1, Ordering::SeqCst);
        self.sabotage()?;
        self.state.finish();
        Ok(())
    }

    async fn on_canceled(&self) -> Result<()> {
        self.canceled_calls.fetch_add(1, Ordering::SeqCst);
        self.sabotage()?;
        self.state.cancel();
        Ok(())
    }

    async fn on_errored(&self) -> Result<()> {
        self.errored_calls.fetch_add(1, Ordering::SeqCst);
        self.sabotage()?;
        self.state.error();
        Ok(())
    }
}

/// Hooks that take `hook_time` to persist before recording the status.
pub struct SlowHookJob {
    state: JobState,
    run_time: Duration,
    hook_time: Duration,
    persisted: AtomicUsize,
}

impl SlowHookJob {
    pub fn new(run_time: Duration, hook_time: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: JobState::new(),
            run_time,
            hook_time,
            persisted: AtomicUsize::new(0),
        })
    }

    pub fn persisted(&self) -> usize {
        self.persisted.load(Ordering::SeqCst)
    }

    async fn persist(&self) {
        tokio::time::sleep(self.hook_time).await;
        self.persisted.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Job for SlowHookJob {
    fn state(&self) -> &JobState {
        &self.state
    }

    async fn run(&self) -> Result<()> {
        tokio::time::sleep(self.run_time).await;
        Ok(())
    }

    async fn on_finished(&self) -> Result<()> {
        self.persist().await;
        self.state.finish();
        Ok(())
    }

    async fn on_canceled(&self) -> Result<()> {
        self.persist().await;
        self.state.cancel();
        Ok(())
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Source whose first poll stalls for `stall` before handing out a job.
pub struct StallingSource {
    stall: Duration,
    stalled: AtomicUsize,
    pub queue: JobQueue,
}

impl StallingSource {
    pub fn new(stall: Duration) -> Self {
        Self {
            stall,
            stalled: AtomicUsize::new(0),
            queue: JobQueue::new(),
        }
    }
}

#[async_trait]
impl JobSource for StallingSource {
    async fn poll(&self) -> Result<Option<Arc<dyn Job>>> {
        if self.stalled.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(self.stall).await;
        }
        self.queue.poll().await
    }
}

/// Source whose first `failures` polls error, then delegates to a queue.
pub struct FlakySource {
    failures_left: AtomicUsize,
    polls: AtomicUsize,
    pub queue: JobQueue,
}

impl FlakySource {
    pub fn new(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            polls: AtomicUsize::new(0),
            queue: JobQueue::new(),
        }
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobSource for FlakySource {
    async fn poll(&self) -> Result<Option<Arc<dyn Job>>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(JobError::Internal("job store unreachable".to_string()));
        }
        self.queue.poll().await
    }
}

/// Source that counts polls and never has work.
#[derive(Default)]
pub struct EmptySource {
    polls: AtomicUsize,
}

impl EmptySource {
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobSource for EmptySource {
    async fn poll(&self) -> Result<Option<Arc<dyn Job>>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}
