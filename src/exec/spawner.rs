//! The pluggable process-spawning primitive.
//!
//! [`BuildExecutor`](super::BuildExecutor) depends only on the narrow
//! [`ProcessSpawner`] capability, not on any particular OS process API, so
//! tests substitute a [`MockSpawner`](super::MockSpawner) without changing
//! calling code.

use async_trait::async_trait;
use std::pin::Pin;
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::Command;

use super::command::BuildCommand;
use super::error::ExecError;

/// One captured output pipe of a spawned process.
pub type ProcessPipe = Box<dyn AsyncRead + Send + Unpin>;

/// Resolves once the OS process has terminated and its exit code was read.
pub type StatusFuture =
    Pin<Box<dyn futures::Future<Output = Result<ExitStatus, ExecError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            ExitStatus::Signal(_) => None,
        }
    }
}

/// A launched child process: both output read ends plus the exit slot.
///
/// Stdin is closed at spawn. Exactly one of these exists per execution; it is
/// consumed by pumping and never reused.
pub struct SpawnedProcess {
    pub stdout: ProcessPipe,
    pub stderr: ProcessPipe,
    pub status: StatusFuture,
}

impl std::fmt::Debug for SpawnedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedProcess")
            .field("stdout", &"<pipe>")
            .field("stderr", &"<pipe>")
            .field("status", &"<future>")
            .finish()
    }
}

#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    async fn spawn(&self, command: &BuildCommand) -> Result<SpawnedProcess, ExecError>;
}

/// Production spawner backed by `tokio::process`.
pub struct TokioSpawner;

impl TokioSpawner {
    fn configure_command(command: &BuildCommand) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);

        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        // The engine never feeds the child; a piped-but-unwritten stdin
        // would make `read`-style children hang.
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    fn convert_exit_status(status: std::process::ExitStatus) -> ExitStatus {
        if status.success() {
            ExitStatus::Success
        } else if let Some(code) = status.code() {
            ExitStatus::Error(code)
        } else {
            Self::parse_signal_status(status)
        }
    }

    #[cfg(unix)]
    fn parse_signal_status(status: std::process::ExitStatus) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            ExitStatus::Signal(signal)
        } else {
            ExitStatus::Error(1)
        }
    }

    #[cfg(not(unix))]
    fn parse_signal_status(_status: std::process::ExitStatus) -> ExitStatus {
        ExitStatus::Error(1)
    }

    fn map_spawn_error(error: std::io::Error, command: &BuildCommand) -> ExecError {
        if error.kind() == std::io::ErrorKind::NotFound {
            ExecError::CommandNotFound(command.program.clone())
        } else {
            ExecError::SpawnFailed {
                command: command.to_display_string(),
                source: error,
            }
        }
    }

    fn create_status_future(mut child: tokio::process::Child, rendered: String) -> StatusFuture {
        Box::pin(async move {
            match child.wait().await {
                Ok(status) => {
                    let status = Self::convert_exit_status(status);
                    tracing::debug!("Process finished ({:?}): {}", status, rendered);
                    Ok(status)
                }
                Err(e) => {
                    tracing::warn!("Failed to wait for process {}: {}", rendered, e);
                    Err(ExecError::Io(e))
                }
            }
        })
    }
}

#[async_trait]
impl ProcessSpawner for TokioSpawner {
    async fn spawn(&self, command: &BuildCommand) -> Result<SpawnedProcess, ExecError> {
        tracing::debug!("Spawning build process: {}", command.to_display_string());
        if let Some(ref dir) = command.working_dir {
            tracing::trace!("Working directory: {:?}", dir);
        }

        let mut cmd = Self::configure_command(command);
        let mut child = cmd
            .spawn()
            .map_err(|e| Self::map_spawn_error(e, command))?;

        let stdout = child
            .stdout
            .take()
            .ok_or(ExecError::StreamCapture("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(ExecError::StreamCapture("stderr"))?;

        Ok(SpawnedProcess {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            status: Self::create_status_future(child, command.to_display_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::BuildCommandBuilder;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_spawn_captures_stdout() {
        let command = BuildCommandBuilder::new("echo").arg("hello").build();
        let mut process = TokioSpawner.spawn(&command).await.unwrap();

        let mut out = String::new();
        process.stdout.read_to_string(&mut out).await.unwrap();
        assert_eq!(out.trim(), "hello");

        let status = process.status.await.unwrap();
        assert!(status.success());
        assert_eq!(status.code(), Some(0));
    }

    #[tokio::test]
    async fn test_spawn_nonzero_exit() {
        let command = BuildCommandBuilder::new("sh")
            .arg("-c")
            .arg("exit 3")
            .build();
        let process = TokioSpawner.spawn(&command).await.unwrap();

        let status = process.status.await.unwrap();
        assert_eq!(status, ExitStatus::Error(3));
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_spawn_command_not_found() {
        let command = BuildCommandBuilder::new("nonexistent-command-12345").build();
        let result = TokioSpawner.spawn(&command).await;

        assert!(matches!(
            result.unwrap_err(),
            ExecError::CommandNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_spawn_stdin_is_closed() {
        // A child reading stdin must see EOF immediately, not hang.
        let command = BuildCommandBuilder::new("cat").build();
        let mut process = TokioSpawner.spawn(&command).await.unwrap();

        let mut out = String::new();
        process.stdout.read_to_string(&mut out).await.unwrap();
        assert!(out.is_empty());
        assert!(process.status.await.unwrap().success());
    }

    #[tokio::test]
    async fn test_spawn_honors_working_dir_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let command = BuildCommandBuilder::new("sh")
            .arg("-c")
            .arg("pwd; printf '%s\\n' \"$BUILD_LABEL\"")
            .current_dir(dir.path())
            .env("BUILD_LABEL", "nightly")
            .build();
        let mut process = TokioSpawner.spawn(&command).await.unwrap();

        let mut out = String::new();
        process.stdout.read_to_string(&mut out).await.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].ends_with(
            dir.path().file_name().unwrap().to_str().unwrap()
        ));
        assert_eq!(lines[1], "nightly");
        assert!(process.status.await.unwrap().success());
    }
}
