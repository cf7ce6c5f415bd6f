use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::scheduler::job::Job;

/// Where a [`JobRunner`](crate::scheduler::JobRunner) gets its work from.
///
/// `poll` returns the next job, or `None` when nothing is available right now.
/// It must not block the calling task indefinitely; blocking I/O belongs on
/// `tokio::task::spawn_blocking`. An `Err` is logged by the runner and treated
/// as an empty poll, so a failing implementation must not have consumed a job.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn poll(&self) -> Result<Option<Arc<dyn Job>>>;
}

#[async_trait]
impl<T: JobSource + ?Sized> JobSource for Arc<T> {
    async fn poll(&self) -> Result<Option<Arc<dyn Job>>> {
        (**self).poll().await
    }
}
