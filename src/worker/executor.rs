use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::process::Command;
use uuid::Uuid;

use crate::error::{JobError, Result};
use crate::scheduler::{Job, JobState};

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// Job that runs `sh -c <command>` in a child process.
///
/// A non-zero exit marks the job errored with stderr (or the exit code) as the
/// reason. Output is kept for inspection after the runner is done with it.
#[derive(Debug)]
pub struct CommandJob {
    pub id: Uuid,
    pub command: String,
    pub created_at: DateTime<Utc>,
    state: JobState,
    output: Mutex<Option<CommandOutput>>,
}

impl CommandJob {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            command: command.into(),
            created_at: Utc::now(),
            state: JobState::new(),
            output: Mutex::new(None),
        }
    }

    /// Output of the last completed run, if the process could be started.
    pub fn output(&self) -> Option<CommandOutput> {
        self.output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn process_output(&self, output: std::process::Output) -> Result<()> {
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code();

        tracing::debug!(
            job_id = %self.id,
            exit_code = ?exit_code,
            "Command exited"
        );

        let result = if output.status.success() {
            Ok(())
        } else {
            Err(JobError::Failed(if stderr.is_empty() {
                format!("Exit code: {:?}", exit_code)
            } else {
                stderr.clone()
            }))
        };

        *self
            .output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(CommandOutput {
            exit_code,
            stdout: if stdout.is_empty() { None } else { Some(stdout) },
            stderr: if stderr.is_empty() { None } else { Some(stderr) },
            completed_at: Utc::now(),
        });

        result
    }
}

#[async_trait]
impl Job for CommandJob {
    fn state(&self) -> &JobState {
        &self.state
    }

    fn name(&self) -> &str {
        &self.command
    }

    async fn run(&self) -> Result<()> {
        tracing::info!(job_id = %self.id, command = %self.command, "Executing command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        self.process_output(output)
    }
}
