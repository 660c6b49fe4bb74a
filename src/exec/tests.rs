use super::*;
use crate::output::sink::test_support::CollectingSink;
use crate::output::StreamPumper;
use std::sync::Arc;

#[tokio::test]
async fn test_execute_and_wait_success_captures_output() {
    let executor = BuildExecutor::production();
    let sink = Arc::new(CollectingSink::new());
    let command = BuildCommandBuilder::new("sh")
        .arg("-c")
        .arg("echo building; echo done")
        .build();

    let summary = executor
        .execute_and_wait(&command, sink.clone())
        .await
        .unwrap();

    assert!(summary.status.success());
    assert_eq!(summary.stdout.lines_delivered, 2);
    assert_eq!(sink.lines(), vec!["building", "done"]);
}

#[tokio::test]
async fn test_execute_and_wait_nonzero_exit_is_reported() {
    let executor = BuildExecutor::production();
    let sink = Arc::new(CollectingSink::new());
    let command = BuildCommandBuilder::new("sh")
        .arg("-c")
        .arg("echo partial output; exit 2")
        .build();

    let err = executor
        .execute_and_wait(&command, sink.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::ExitCode(2)));
    // Output captured before the failure stays available.
    assert_eq!(sink.lines(), vec!["partial output"]);
}

#[tokio::test]
async fn test_execute_and_wait_command_not_found() {
    let executor = BuildExecutor::production();
    let sink = Arc::new(CollectingSink::new());
    let command = BuildCommandBuilder::new("nonexistent-command-12345").build();

    let err = executor.execute_and_wait(&command, sink).await.unwrap_err();
    assert!(matches!(err, ExecError::CommandNotFound(_)));
}

#[tokio::test]
async fn test_execute_and_wait_with_binary_pumpers() {
    let executor = BuildExecutor::production();
    let sink = Arc::new(CollectingSink::new());
    let command = BuildCommandBuilder::new("printf")
        .arg("payload")
        .build();

    let summary = executor
        .execute_and_wait_with(
            &command,
            StreamPumper::binary(sink.clone()),
            StreamPumper::text(Arc::new(crate::output::LoggingSink::new("stderr"))),
        )
        .await
        .unwrap();

    assert_eq!(sink.bytes(), b"payload");
    assert_eq!(summary.stdout.bytes_read, 7);
}

#[tokio::test]
async fn test_mock_spawner_scripted_streams() {
    let (manager, mut mock) = ExecManager::mock();

    mock.expect_command("make")
        .with_args(|args| args == ["test"])
        .returns_stdout("compiling\nlinking\nok\n")
        .returns_stderr("warning: dusty corners\n")
        .returns_success()
        .finish();

    let sink = Arc::new(CollectingSink::new());
    let command = BuildCommandBuilder::new("make").arg("test").build();
    let summary = manager
        .executor()
        .execute_and_wait(&command, sink.clone())
        .await
        .unwrap();

    assert!(summary.status.success());
    assert_eq!(sink.lines(), vec!["compiling", "linking", "ok"]);
    assert!(mock.verify_called("make", 1));
}

#[tokio::test]
async fn test_mock_spawner_failure_exit_code() {
    let (manager, mut mock) = ExecManager::mock();

    mock.expect_command("make")
        .returns_stdout("nope\n")
        .returns_exit_code(1)
        .finish();

    let sink = Arc::new(CollectingSink::new());
    let command = BuildCommandBuilder::new("make").build();
    let err = manager
        .executor()
        .execute_and_wait(&command, sink.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::ExitCode(1)));
    assert_eq!(sink.lines(), vec!["nope"]);
}

#[tokio::test]
async fn test_mock_spawner_unexpected_command() {
    let (manager, _mock) = ExecManager::mock();

    let command = BuildCommandBuilder::new("surprise").build();
    let result = manager.executor().execute(&command).await;
    assert!(matches!(
        result.unwrap_err(),
        ExecError::MockExpectationNotMet(_)
    ));
}

#[tokio::test]
async fn test_mock_spawner_call_limit() {
    let (manager, mut mock) = ExecManager::mock();

    mock.expect_command("once").times(1).finish();

    let command = BuildCommandBuilder::new("once").build();
    let executor = manager.executor();
    assert!(executor.execute(&command).await.is_ok());
    assert!(matches!(
        executor.execute(&command).await.unwrap_err(),
        ExecError::MockExpectationNotMet(_)
    ));
}

#[tokio::test]
async fn test_mock_call_history_records_commands() {
    let (manager, mut mock) = ExecManager::mock();
    mock.expect_command("env").returns_success().finish();

    let command = BuildCommandBuilder::new("env").env("CI", "true").build();
    manager.executor().execute(&command).await.unwrap();

    let history = mock.get_call_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].env.get("CI"), Some(&"true".to_string()));
}
