// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cancellation kills the child, reaps it, and keeps flushed output.
#![cfg(unix)]

use runcx_process::{
    Attachments, CancelToken, CancellationPolicy, CapturedOutput, Cmd, LaunchOutcome,
    ProcessError, ProcessLauncher, ProcessSpec, SinkHandle, StdioMode,
};
use std::time::{Duration, Instant};

async fn pid_exists(pid: u32) -> bool {
    Cmd::new("sh")
        .args(["-c".to_string(), format!("kill -0 {pid}")])
        .separate_stderr(true)
        .stderr(SinkHandle::new(CapturedOutput::new()))
        .run()
        .await
        .is_ok()
}

#[tokio::test]
async fn cancelled_wait_kills_and_the_pid_is_gone() {
    let capture = CapturedOutput::new();
    let mut spec = ProcessSpec::new("sleep");
    spec.args = vec!["1000".into()];
    spec.stderr = StdioMode::Null;
    let attachments = Attachments {
        stdout: Some(SinkHandle::new(capture.clone())),
        ..Default::default()
    };

    let token = CancelToken::new();
    token.cancel_after(Duration::from_secs(1));
    let started = Instant::now();
    let outcome = ProcessLauncher::new()
        .launch(&spec, attachments, &token)
        .await
        .unwrap();

    let pid = match outcome {
        LaunchOutcome::Killed { pid: Some(pid) } => pid,
        other => panic!("expected a kill, got {other:?}"),
    };
    assert!(started.elapsed() < Duration::from_secs(30));
    assert!(!pid_exists(pid).await, "pid {pid} should be gone");
}

#[tokio::test]
async fn cancellation_reaches_processes_the_child_started() {
    // `sh` forks `sleep` here rather than exec'ing it, so the grandchild
    // shares the stdout pipe.
    let token = CancelToken::new();
    token.cancel_after(Duration::from_millis(300));
    let started = Instant::now();
    let err = tokio::time::timeout(
        Duration::from_secs(10),
        Cmd::new("sh")
            .args(["-c", "echo started; sleep 20; echo done"])
            .cancel_token(token)
            .run(),
    )
    .await
    .expect("cancelled run should return")
    .unwrap_err();

    match err {
        ProcessError::Killed { output, .. } => assert_eq!(output, "started\n"),
        other => panic!("expected Killed, got {other:?}"),
    }
    // Well under the drain grace: the group kill closed the pipe.
    assert!(
        started.elapsed() < ProcessLauncher::DEFAULT_DRAIN_GRACE,
        "took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn cancellation_keeps_everything_flushed_before_the_kill() {
    let script = "i=0; while [ $i -lt 100 ]; do echo line$i; i=$((i+1)); done; exec sleep 1000";
    let token = CancelToken::new();
    token.cancel_after(Duration::from_secs(1));
    let err = Cmd::new("sh")
        .args(["-c", script])
        .cancel_token(token)
        .run()
        .await
        .unwrap_err();

    let output = match err {
        ProcessError::Killed { output, .. } => output,
        other => panic!("expected Killed, got {other:?}"),
    };
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 100);
    assert_eq!(lines[0], "line0");
    assert_eq!(lines[99], "line99");
}

#[tokio::test]
async fn convert_policy_chains_the_kill() {
    let token = CancelToken::new();
    token.cancel_after(Duration::from_millis(300));
    let err = Cmd::new("sh")
        .args(["-c", "echo partial; exec sleep 1000"])
        .cancel_token(token)
        .cancellation_policy(CancellationPolicy::ConvertToCancelled)
        .run()
        .await
        .unwrap_err();

    assert!(err.is_cancellation());
    assert_eq!(err.output(), Some("partial\n"));
    let source = std::error::Error::source(&err).expect("cancellation keeps the kill");
    assert!(source.to_string().contains("killed"));
}

#[tokio::test]
async fn blocked_stdin_does_not_hold_up_teardown() {
    let (_writer, reader) = tokio::io::duplex(8);
    let token = CancelToken::new();
    token.cancel_after(Duration::from_millis(300));
    let started = Instant::now();
    let err = Cmd::new("sleep")
        .arg("1000")
        .stdin(runcx_process::InputSource::reader(reader))
        .cancel_token(token)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessError::Killed { .. }));
    assert!(started.elapsed() < Duration::from_secs(30));
}

#[tokio::test]
async fn already_cancelled_token_kills_at_once() {
    let token = CancelToken::new();
    token.cancel();
    let err = Cmd::new("sleep")
        .arg("1000")
        .cancel_token(token)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessError::Killed { .. }));
}
