//! Concrete job implementations.
//!
//! # Components
//!
//! - [`CommandJob`]: runs a shell command in a child process and captures its output
//!
//! # Cancellation
//!
//! The child is spawned with `kill_on_drop`, so a hard shutdown of the runner
//! kills the process instead of leaving it orphaned.

pub mod executor;

pub use executor::{CommandJob, CommandOutput};
