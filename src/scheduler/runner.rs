use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::RunnerConfig;
use crate::error::{JobError, Result};
use crate::scheduler::job::Job;
use crate::scheduler::source::JobSource;
use crate::scheduler::stats::{JobOutcome, RunnerStats, StatsSnapshot};

/// Polls a [`JobSource`] and executes its jobs with at most
/// `max_concurrency` in flight.
///
/// `run` drives the scheduling loop; `shutdown` and `graceful_shutdown` may be
/// called from any other task holding a reference to the runner.
pub struct JobRunner<S> {
    source: S,
    config: RunnerConfig,
    semaphore: Arc<Semaphore>,
    /// Stops admission. Cancelled by both shutdown flavors.
    stop: CancellationToken,
    /// Interrupts in-flight units. Cancelled by hard shutdown only.
    cancel: CancellationToken,
    tracker: TaskTracker,
    loop_active: watch::Sender<bool>,
    stats: Arc<RunnerStats>,
}

impl<S: JobSource> JobRunner<S> {
    pub fn new(source: S) -> Self {
        Self::build(source, RunnerConfig::default())
    }

    pub fn with_config(source: S, config: RunnerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(source, config))
    }

    fn build(source: S, config: RunnerConfig) -> Self {
        let (loop_active, _) = watch::channel(false);
        Self {
            source,
            semaphore: Arc::new(Semaphore::new(config.max_concurrency)),
            config,
            stop: CancellationToken::new(),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            loop_active,
            stats: Arc::new(RunnerStats::default()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// False once either shutdown flavor has been requested.
    pub fn is_running(&self) -> bool {
        !self.stop.is_cancelled()
    }

    /// Number of admitted jobs that have not finished their terminal hook.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.in_flight())
    }

    /// Run the scheduling loop until shutdown.
    ///
    /// Each iteration acquires a concurrency slot, polls the source and either
    /// spawns the job or releases the slot and backs off for `poll_interval`.
    /// Poll and job failures are logged and never end the loop.
    ///
    /// After a hard shutdown this waits for every admitted unit to settle
    /// before returning: canceled jobs run their `on_canceled` hook, and a job
    /// dequeued by a poll that outlived the shutdown runs to completion.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::AlreadyRunning`] if another `run` is active on this
    /// runner.
    pub async fn run(&self) -> Result<()> {
        let claimed = self.loop_active.send_if_modified(|active| {
            if *active {
                false
            } else {
                *active = true;
                true
            }
        });
        if !claimed {
            return Err(JobError::AlreadyRunning);
        }
        let _loop_guard = LoopGuard(&self.loop_active);

        tracing::info!(
            max_concurrency = self.config.max_concurrency,
            poll_interval_ms = self.config.poll_interval_ms,
            "Job runner started"
        );

        while self.is_running() {
            let permit = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                permit = Arc::clone(&self.semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            // Shutdown may have arrived while we waited for a free slot.
            if !self.is_running() {
                drop(permit);
                break;
            }

            match self.poll_next().await {
                Some(job) => self.admit(job, permit),
                None => {
                    drop(permit);
                    tokio::select! {
                        _ = self.stop.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval()) => {}
                    }
                }
            }
        }

        if self.cancel.is_cancelled() {
            self.tracker.close();
            self.tracker.wait().await;
        }

        tracing::info!(in_flight = self.in_flight(), "Job runner stopped");
        Ok(())
    }

    async fn poll_next(&self) -> Option<Arc<dyn Job>> {
        match AssertUnwindSafe(self.source.poll()).catch_unwind().await {
            Ok(Ok(Some(job))) => Some(job),
            Ok(Ok(None)) => {
                self.stats.record_empty_poll();
                None
            }
            Ok(Err(e)) => {
                self.stats.record_poll_error();
                tracing::warn!(error = %e, "Failed to poll for next job");
                None
            }
            Err(panic) => {
                self.stats.record_poll_error();
                tracing::warn!(error = %panic_message(&*panic), "Job source panicked while polling");
                None
            }
        }
    }

    fn admit(&self, job: Arc<dyn Job>, permit: OwnedSemaphorePermit) {
        self.stats.record_admitted();
        tracing::debug!(job = job.name(), "Job admitted");

        // A hard shutdown only interrupts units already in flight when it lands.
        // A job dequeued by a poll that outlived it has left the source, so it
        // runs to completion and `run` drains it.
        let cancel = if self.cancel.is_cancelled() {
            tracing::debug!(job = job.name(), "Job dequeued after hard shutdown, running to completion");
            CancellationToken::new()
        } else {
            self.cancel.clone()
        };
        let stats = Arc::clone(&self.stats);
        self.tracker.spawn(async move {
            // Released on every exit path of this unit.
            let _permit = permit;
            let outcome = execute(job, cancel).await;
            stats.record_outcome(outcome);
        });
    }

    /// Stop polling and cancel every in-flight job.
    ///
    /// A job returned by a poll still pending at this point is admitted and
    /// runs to completion instead. Does not wait for the jobs to stop. Safe to
    /// call repeatedly and from any task.
    pub fn shutdown(&self) {
        if self.is_running() {
            tracing::info!(in_flight = self.in_flight(), "Hard shutdown requested");
        }
        self.stop.cancel();
        self.cancel.cancel();
    }

    /// Stop polling and wait for every in-flight job to reach a terminal status.
    ///
    /// Never cancels anything. Must not be awaited from inside a job run by
    /// this runner, since it waits for that job too.
    pub async fn graceful_shutdown(&self) {
        tracing::info!(in_flight = self.in_flight(), "Graceful shutdown requested");
        self.stop.cancel();
        tokio::task::yield_now().await;

        // Once the loop has left, nothing else can be admitted.
        let mut loop_active = self.loop_active.subscribe();
        loop {
            let active = *loop_active.borrow_and_update();
            if !active || loop_active.changed().await.is_err() {
                break;
            }
        }

        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("Graceful shutdown complete");
    }
}

struct LoopGuard<'a>(&'a watch::Sender<bool>);

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

/// Execute one admitted job and its terminal hook.
async fn execute(job: Arc<dyn Job>, cancel: CancellationToken) -> JobOutcome {
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = AssertUnwindSafe(job.run()).catch_unwind() => Some(result),
    };

    let outcome = match result {
        Some(Ok(Ok(()))) => JobOutcome::Finished,
        Some(Ok(Err(e))) => {
            tracing::warn!(job = job.name(), error = %e, "Job execution failed");
            JobOutcome::Errored
        }
        Some(Err(panic)) => {
            let e = JobError::Panicked(panic_message(&*panic));
            tracing::warn!(job = job.name(), error = %e, "Job execution failed");
            JobOutcome::Errored
        }
        None => {
            tracing::debug!(job = job.name(), "Job canceled");
            JobOutcome::Canceled
        }
    };

    run_hook(&job, outcome).await;
    tracing::debug!(job = job.name(), status = %job.status(), "Job completed");
    outcome
}

/// Run the terminal hook in its own task so a cancellation of the unit cannot
/// interrupt it. Hook failures are logged and swallowed.
async fn run_hook(job: &Arc<dyn Job>, outcome: JobOutcome) {
    let hook_job = Arc::clone(job);
    let handle = tokio::spawn(async move {
        match outcome {
            JobOutcome::Finished => hook_job.on_finished().await,
            JobOutcome::Canceled => hook_job.on_canceled().await,
            JobOutcome::Errored => hook_job.on_errored().await,
        }
    });

    match handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(job = job.name(), hook = outcome.hook_name(), error = %e, "Job hook failed");
        }
        Err(e) => {
            tracing::warn!(job = job.name(), hook = outcome.hook_name(), error = %e, "Job hook panicked");
        }
    }

    // A hook that bailed out before recording still leaves the job terminal.
    if job.state().settle(outcome.status()) {
        tracing::debug!(job = job.name(), hook = outcome.hook_name(), "Status settled by runner");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
