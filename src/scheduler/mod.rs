//! Bounded-concurrency job scheduling.
//!
//! - [`Job`]: a unit of async work with a [`JobStatus`] lifecycle
//! - [`JobSource`]: the poll contract a runner pulls work from
//! - [`JobQueue`]: in-memory FIFO source
//! - [`JobRunner`]: the scheduling loop and its shutdown paths

pub mod job;
pub mod queue;
pub mod runner;
pub mod source;
pub mod stats;

pub use job::{Job, JobState, JobStatus};
pub use queue::JobQueue;
pub use runner::JobRunner;
pub use source::JobSource;
pub use stats::{JobOutcome, RunnerStats, StatsSnapshot};
