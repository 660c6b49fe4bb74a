//! Build execution: spawn a command and pump its output to completion.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::output::{LineSink, LoggingSink, PumpOutcome, StreamPumper};

use super::command::BuildCommand;
use super::error::ExecError;
use super::spawner::{ExitStatus, ProcessSpawner, SpawnedProcess, TokioSpawner};

/// What a completed (zero-exit) execution looked like.
#[derive(Debug)]
pub struct ExecutionSummary {
    pub status: ExitStatus,
    pub duration: Duration,
    pub stdout: PumpOutcome,
    pub stderr: PumpOutcome,
}

/// Runs build commands through a pluggable [`ProcessSpawner`].
pub struct BuildExecutor {
    spawner: Arc<dyn ProcessSpawner>,
}

impl BuildExecutor {
    pub fn new(spawner: Arc<dyn ProcessSpawner>) -> Self {
        Self { spawner }
    }

    /// Executor backed by real OS processes.
    pub fn production() -> Self {
        Self::new(Arc::new(TokioSpawner))
    }

    pub fn spawner(&self) -> Arc<dyn ProcessSpawner> {
        Arc::clone(&self.spawner)
    }

    /// Spawn without pumping. The caller owns the streams and the exit slot.
    pub async fn execute(&self, command: &BuildCommand) -> Result<SpawnedProcess, ExecError> {
        self.spawner.spawn(command).await
    }

    /// Spawn, pump stdout into `stdout_sink` and stderr into the tracing
    /// log, wait for exit, and require a zero exit code.
    ///
    /// A non-zero exit or signal termination is reported as
    /// [`ExecError::ExitCode`] / [`ExecError::Signal`]; everything already
    /// captured stays available through the caller's sink either way. Exit
    /// code semantics ("build failed" vs "tool crashed") are the caller's
    /// business.
    pub async fn execute_and_wait(
        &self,
        command: &BuildCommand,
        stdout_sink: Arc<dyn LineSink>,
    ) -> Result<ExecutionSummary, ExecError> {
        let stderr_sink: Arc<dyn LineSink> = Arc::new(LoggingSink::new("stderr"));
        self.execute_and_wait_with(
            command,
            StreamPumper::text(stdout_sink),
            StreamPumper::text(stderr_sink),
        )
        .await
    }

    /// Like [`execute_and_wait`](Self::execute_and_wait) with caller-built
    /// pumpers, for binary capture or custom stderr routing.
    pub async fn execute_and_wait_with(
        &self,
        command: &BuildCommand,
        stdout_pumper: StreamPumper,
        stderr_pumper: StreamPumper,
    ) -> Result<ExecutionSummary, ExecError> {
        let start = Instant::now();
        tracing::debug!("Executing build command: {}", command.to_display_string());

        let SpawnedProcess {
            stdout,
            stderr,
            status,
        } = self.spawner.spawn(command).await?;

        let stdout_handle = tokio::spawn(async move { stdout_pumper.pump(stdout).await });
        let stderr_handle = tokio::spawn(async move { stderr_pumper.pump(stderr).await });

        let status = status.await?;

        // Both pipes are fully consumed before control returns, on success
        // and error paths alike.
        let stdout_outcome = stdout_handle
            .await
            .map_err(|e| ExecError::Io(std::io::Error::other(e)))?;
        let stderr_outcome = stderr_handle
            .await
            .map_err(|e| ExecError::Io(std::io::Error::other(e)))?;

        let duration = start.elapsed();
        tracing::debug!(
            "Build command finished in {:?} ({:?}): {} stdout lines, {} stderr lines",
            duration,
            status,
            stdout_outcome.lines_delivered,
            stderr_outcome.lines_delivered
        );

        match status {
            ExitStatus::Success => Ok(ExecutionSummary {
                status,
                duration,
                stdout: stdout_outcome,
                stderr: stderr_outcome,
            }),
            ExitStatus::Error(code) => Err(ExecError::ExitCode(code)),
            ExitStatus::Signal(signal) => Err(ExecError::Signal(signal)),
        }
    }
}
