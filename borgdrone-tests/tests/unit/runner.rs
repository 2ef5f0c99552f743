//! Unit tests for child process supervision

use borgdrone::managers::logging::mock::{CapturingLogger, LogLevel};
use borgdrone::utils::runner::{drain_lines, CommandRunner, ExecutionError, ProcessRunner, StreamKind};
use std::sync::Arc;
use test_utils::{MockResponse, MockRunner};

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_drain_preserves_order_within_stream() {
    let logger = CapturingLogger::new();
    let input: &[u8] = b"one\ntwo\r\nthree";

    let lines = drain_lines(input, StreamKind::Stdout, &logger, true)
        .await
        .unwrap();

    assert_eq!(lines, vec!["one", "two", "three"]);
    assert!(logger.messages(LogLevel::Debug).is_empty());
    assert!(logger.messages(LogLevel::Stderr).is_empty());
}

#[cfg(unix)]
#[test]
fn test_non_zero_exit_is_not_an_error() {
    let logger = CapturingLogger::new();
    let runner = ProcessRunner::new(Arc::new(logger.clone())).unwrap();

    let outcome = runner
        .run_captured(
            "sh",
            &[],
            &args(&["-c", "echo out; echo err >&2; exit 4"]),
        )
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, Some(4));
    assert_eq!(outcome.stdout, vec!["out"]);
    assert_eq!(outcome.stderr, vec!["err"]);
    assert_eq!(logger.messages(LogLevel::Stderr), vec!["err"]);
}

#[cfg(unix)]
#[test]
fn test_early_close_of_one_stream_does_not_stall_the_other() {
    let runner = ProcessRunner::new(Arc::new(CapturingLogger::new())).unwrap();

    let script = "exec 2>&-; i=0; while [ $i -lt 2000 ]; do echo line$i; i=$((i+1)); done";
    let outcome = runner
        .run_captured("sh", &[], &args(&["-c", script]))
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.stdout.len(), 2000);
    assert!(outcome.stderr.is_empty());
}

#[test]
fn test_missing_executable_is_reported_before_spawn() {
    let runner = ProcessRunner::new(Arc::new(CapturingLogger::new())).unwrap();
    let err = runner
        .run("borgdrone-no-such-binary", &[], &[])
        .unwrap_err();

    assert!(matches!(err, ExecutionError::MissingExecutable(_)));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_start_failure_exit_code() {
    let runner = MockRunner::new().with_default_response(MockResponse::StartFailure);
    let err = runner.run("borg", &[], &[]).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}
