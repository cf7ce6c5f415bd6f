use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Acquire a permit, giving up after `timeout`.
///
/// Returns `None` if no permit became available in time or the semaphore was
/// closed. The permit is released when dropped.
pub async fn acquire_with_timeout(
    semaphore: &Arc<Semaphore>,
    timeout: Duration,
) -> Option<OwnedSemaphorePermit> {
    match tokio::time::timeout(timeout, Arc::clone(semaphore).acquire_owned()).await {
        Ok(Ok(permit)) => Some(permit),
        Ok(Err(_)) => None,
        Err(_) => {
            let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            tracing::debug!(timeout_ms, "Permit acquisition timed out");
            None
        }
    }
}
