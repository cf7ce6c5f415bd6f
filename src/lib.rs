pub mod config;
pub mod error;
pub mod runtime;
pub mod scheduler;
pub mod shutdown;
pub mod sync;
pub mod worker;

pub use config::RunnerConfig;
pub use error::{JobError, Result};
pub use scheduler::{Job, JobQueue, JobRunner, JobSource, JobState, JobStatus};
