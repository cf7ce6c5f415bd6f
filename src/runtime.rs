//! Bridges between synchronous callers and the tokio runtime.

use std::future::Future;

use tokio::runtime::{Builder, Handle};

use crate::error::{JobError, Result};

/// Drive `future` to completion from synchronous code.
///
/// Outside a runtime a current-thread runtime is built for the call. Inside
/// one, blocking the caller's runtime would panic, so the future runs on a
/// fresh runtime on a scoped thread instead.
pub fn block_on<F>(future: F) -> Result<F::Output>
where
    F: Future + Send,
    F::Output: Send,
{
    if Handle::try_current().is_err() {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        return Ok(runtime.block_on(future));
    }

    std::thread::scope(|scope| {
        scope
            .spawn(|| -> Result<F::Output> {
                let runtime = Builder::new_current_thread().enable_all().build()?;
                Ok(runtime.block_on(future))
            })
            .join()
            .map_err(|_| JobError::Internal("block_on worker thread panicked".to_string()))?
    })
}

/// Id of the task currently being polled, if any.
pub fn current_task_id() -> Option<tokio::task::Id> {
    tokio::task::try_id()
}
