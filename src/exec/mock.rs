use async_trait::async_trait;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use super::command::BuildCommand;
use super::error::ExecError;
use super::spawner::{ExitStatus, ProcessSpawner, SpawnedProcess};

/// Scripted [`ProcessSpawner`] for tests.
///
/// Expectations are matched by program name (and optional argument matcher);
/// each match serves its scripted stdout/stderr bytes through in-memory
/// pipes and resolves the exit slot with the scripted status.
#[derive(Clone)]
pub struct MockSpawner {
    expectations: Arc<Mutex<Vec<MockExpectation>>>,
    call_history: Arc<Mutex<Vec<BuildCommand>>>,
}

struct MockExpectation {
    program: String,
    #[allow(clippy::type_complexity)]
    args_matcher: Option<Box<dyn Fn(&[String]) -> bool + Send + Sync>>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    status: ExitStatus,
    times_called: usize,
    expected_times: Option<usize>,
}

pub struct MockProcessConfig {
    spawner: MockSpawner,
    expectation: MockExpectation,
}

impl MockSpawner {
    pub fn new() -> Self {
        Self {
            expectations: Arc::new(Mutex::new(Vec::new())),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn expect_command(&mut self, program: &str) -> MockProcessConfig {
        MockProcessConfig {
            spawner: self.clone(),
            expectation: MockExpectation {
                program: program.to_string(),
                args_matcher: None,
                stdout: Vec::new(),
                stderr: Vec::new(),
                status: ExitStatus::Success,
                times_called: 0,
                expected_times: None,
            },
        }
    }

    pub fn verify_called(&self, program: &str, times: usize) -> bool {
        let history = self.call_history.lock().unwrap();
        let count = history.iter().filter(|cmd| cmd.program == program).count();
        count == times
    }

    pub fn get_call_history(&self) -> Vec<BuildCommand> {
        self.call_history.lock().unwrap().clone()
    }

    pub fn reset(&mut self) {
        self.expectations.lock().unwrap().clear();
        self.call_history.lock().unwrap().clear();
    }
}

impl Default for MockSpawner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessSpawner for MockSpawner {
    async fn spawn(&self, command: &BuildCommand) -> Result<SpawnedProcess, ExecError> {
        self.call_history.lock().unwrap().push(command.clone());

        let mut expectations = self.expectations.lock().unwrap();

        for expectation in expectations.iter_mut() {
            if expectation.program != command.program {
                continue;
            }

            if let Some(ref args_matcher) = expectation.args_matcher {
                if !(args_matcher)(&command.args) {
                    continue;
                }
            }

            expectation.times_called += 1;

            if let Some(expected) = expectation.expected_times {
                if expectation.times_called > expected {
                    return Err(ExecError::MockExpectationNotMet(format!(
                        "Command '{}' called {} times, expected {}",
                        command.program, expectation.times_called, expected
                    )));
                }
            }

            let status = expectation.status.clone();
            return Ok(SpawnedProcess {
                stdout: Box::new(Cursor::new(expectation.stdout.clone())),
                stderr: Box::new(Cursor::new(expectation.stderr.clone())),
                status: Box::pin(async move { Ok(status) }),
            });
        }

        Err(ExecError::MockExpectationNotMet(format!(
            "No expectation found for command: {} {:?}",
            command.program, command.args
        )))
    }
}

impl MockProcessConfig {
    pub fn with_args<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.expectation.args_matcher = Some(Box::new(matcher));
        self
    }

    pub fn returns_stdout(mut self, stdout: &str) -> Self {
        self.expectation.stdout = stdout.as_bytes().to_vec();
        self
    }

    pub fn returns_stdout_bytes(mut self, stdout: &[u8]) -> Self {
        self.expectation.stdout = stdout.to_vec();
        self
    }

    pub fn returns_stderr(mut self, stderr: &str) -> Self {
        self.expectation.stderr = stderr.as_bytes().to_vec();
        self
    }

    pub fn returns_exit_code(mut self, code: i32) -> Self {
        self.expectation.status = if code == 0 {
            ExitStatus::Success
        } else {
            ExitStatus::Error(code)
        };
        self
    }

    pub fn returns_success(mut self) -> Self {
        self.expectation.status = ExitStatus::Success;
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.expectation.expected_times = Some(n);
        self
    }

    pub fn finish(self) {
        self.spawner
            .expectations
            .lock()
            .unwrap()
            .push(self.expectation);
    }
}
