// ABOUTME: Integration tests for the process-backed tool invoker.
// ABOUTME: Runs real sh commands to check exit handling, timeouts, stdin, and masking.

use rollout::invoke::{ExternalToolError, Invocation, ProcessInvoker, ToolInvoker};
use std::time::{Duration, Instant};

fn sh(script: &str) -> Invocation {
    Invocation::new("sh").args(["-c", script])
}

#[tokio::test]
async fn captures_stdout_and_stderr() {
    let result = ProcessInvoker::new()
        .invoke(&sh("echo out; echo err >&2"))
        .await
        .unwrap();

    assert_eq!(result.exit_code, Some(0));
    assert!(result.success());
    assert_eq!(result.stdout.trim(), "out");
    assert_eq!(result.stderr.trim(), "err");
}

#[tokio::test]
async fn non_zero_exit_is_an_error_with_stderr() {
    let err = ProcessInvoker::new()
        .invoke(&sh("echo 'Error: release not found' >&2; exit 4"))
        .await
        .unwrap_err();

    match err {
        ExternalToolError::NonZeroExit { code, stderr, .. } => {
            assert_eq!(code, Some(4));
            assert!(stderr.contains("release not found"));
        }
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
}

#[tokio::test]
async fn expected_exit_codes_are_accepted() {
    let result = ProcessInvoker::new()
        .invoke(&sh("exit 1").expect_exit_codes(vec![0, 1]))
        .await
        .unwrap();
    assert_eq!(result.exit_code, Some(1));
}

#[tokio::test]
async fn slow_command_times_out() {
    let started = Instant::now();
    let err = ProcessInvoker::new()
        .invoke(&Invocation::new("sleep").arg("10").timeout(Duration::from_millis(200)))
        .await
        .unwrap_err();

    assert!(matches!(err, ExternalToolError::Timeout { .. }));
    assert!(err.is_transient());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn background_descendant_holding_stdout_still_times_out() {
    // The shell exits at once but its backgrounded child keeps the pipe open.
    let started = Instant::now();
    let err = ProcessInvoker::new()
        .invoke(
            &Invocation::new("sh")
                .args(["-c", "sleep 8 & echo started"])
                .timeout(Duration::from_millis(500)),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err, ExternalToolError::Timeout { after, .. } if after == Duration::from_millis(500)),
        "unexpected error: {err:?}"
    );
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn missing_executable_is_process_not_found() {
    let err = ProcessInvoker::new()
        .invoke(&Invocation::new("rollout-test-no-such-tool"))
        .await
        .unwrap_err();

    assert!(matches!(err, ExternalToolError::ProcessNotFound { .. }));
    assert!(!err.is_transient());
    assert_eq!(err.program(), "rollout-test-no-such-tool");
}

#[tokio::test]
async fn stdin_is_delivered() {
    let result = ProcessInvoker::new()
        .invoke(&Invocation::new("cat").stdin("s3cret"))
        .await
        .unwrap();
    assert_eq!(result.stdout, "s3cret");
}

#[tokio::test]
async fn env_and_cwd_are_applied() {
    let dir = tempfile::tempdir().unwrap();
    let result = ProcessInvoker::new()
        .invoke(
            &sh("echo \"$ROLLOUT_TEST_VALUE\"; pwd")
                .env("ROLLOUT_TEST_VALUE", "from-env")
                .cwd(dir.path()),
        )
        .await
        .unwrap();

    let mut lines = result.stdout.lines();
    assert_eq!(lines.next(), Some("from-env"));
    let cwd = std::path::PathBuf::from(lines.next().unwrap());
    assert_eq!(
        cwd.canonicalize().unwrap(),
        dir.path().canonicalize().unwrap()
    );
}

#[test]
fn secrets_are_masked_in_display() {
    let invocation = Invocation::new("helm")
        .args(["upgrade", "--set", "db.password=hunter2"])
        .secret("hunter2");

    let shown = invocation.to_string();
    assert!(!shown.contains("hunter2"));
    assert!(shown.contains("db.password="));
}
