// SPDX-License-Identifier: MIT OR Apache-2.0
//! Spawning a child and running its stream pumps.

use runcx_cancel::CancelToken;
use runcx_fanout::{SinkHandle, WriterSink};
use runcx_pump::{PumpError, StreamPump};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::bridge::{CancellationBridge, LaunchOutcome, LaunchState};
use crate::error::ProcessError;
use crate::input::InputReader;
use crate::spec::{ProcessSpec, StdioMode};

type PumpTask = JoinHandle<Result<u64, PumpError>>;

/// Sinks and sources connected to a child's piped streams.
///
/// Every stream a [`ProcessSpec`] marks [`StdioMode::Piped`] needs an attachment and
/// every attachment needs a piped stream.
#[derive(Default)]
pub struct Attachments {
    /// Receives the child's stdout.
    pub stdout: Option<SinkHandle>,
    /// Receives the child's stderr.
    pub stderr: Option<SinkHandle>,
    /// Fed into the child's stdin, which is closed once the reader is exhausted.
    pub stdin: Option<InputReader>,
}

impl std::fmt::Debug for Attachments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachments")
            .field("stdout", &self.stdout)
            .field("stderr", &self.stderr)
            .field("stdin", &self.stdin.is_some())
            .finish()
    }
}

/// Cancels its token when dropped, whichever way the launch ends.
struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Starts processes and drives them to an [`LaunchOutcome`].
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    buffer_size: usize,
    drain_grace: Duration,
}

impl ProcessLauncher {
    /// How long output pumps may keep draining after a kill.
    pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(2);

    /// Launcher with the default pump buffer size and drain grace.
    pub fn new() -> Self {
        Self {
            buffer_size: StreamPump::DEFAULT_BUFFER_SIZE,
            drain_grace: Self::DEFAULT_DRAIN_GRACE,
        }
    }

    /// Bound the time output pumps may drain after the child was killed.
    ///
    /// A process outside the killed child's reach can keep a pipe open; once
    /// the grace runs out its pump is aborted and what was already written
    /// to the sinks is kept.
    pub fn drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Set the buffer size of every pump. Zero is raised to one.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    fn pump(&self, label: &'static str) -> StreamPump {
        StreamPump::new(label).buffer_size(self.buffer_size)
    }

    /// Run `spec` to completion or until `cancel` fires.
    ///
    /// Output pumps drain to end of data, so output the child flushed before
    /// it died is kept. After a kill the drain is bounded by
    /// [`drain_grace`](Self::drain_grace). On unix the child leads its own
    /// process group when [`ProcessSpec::uses_process_group`] says so, and
    /// cancellation kills the whole group. The stdin pump stops
    /// once the child has exited; its cancellation and a broken pipe are not
    /// errors.
    pub async fn launch(
        &self,
        spec: &ProcessSpec,
        attachments: Attachments,
        cancel: &CancelToken,
    ) -> Result<LaunchOutcome, ProcessError> {
        spec.validate()?;
        check_wiring("stdin", spec.stdin, attachments.stdin.is_some())?;
        check_wiring("stdout", spec.stdout, attachments.stdout.is_some())?;
        check_wiring("stderr", spec.stderr, attachments.stderr.is_some())?;

        let command = spec.command.as_str();
        debug!(target: "runcx.process", command, args = ?spec.args, cwd = ?spec.cwd, state = ?LaunchState::Starting, "starting process");

        let mut child = spec
            .build_command()
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                command: command.to_string(),
                source,
            })?;
        let pid = child.id();
        debug!(target: "runcx.process", command, ?pid, state = ?LaunchState::Running, "process started");

        let mut outputs: Vec<PumpTask> = Vec::with_capacity(2);
        if let Some(mut sink) = attachments.stdout {
            let mut pipe = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
            let pump = self.pump("stdout");
            outputs.push(tokio::spawn(async move {
                pump.run(&mut pipe, &mut sink, None).await
            }));
        }
        if let Some(mut sink) = attachments.stderr {
            let mut pipe = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;
            let pump = self.pump("stderr");
            outputs.push(tokio::spawn(async move {
                pump.run(&mut pipe, &mut sink, None).await
            }));
        }

        let exit_token = CancelToken::new();
        let _stop_input = CancelOnDrop(exit_token.clone());
        let input: Option<PumpTask> = match attachments.stdin {
            Some(mut reader) => {
                let pipe = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
                let pump = self.pump("stdin").close_on_eof(true);
                let token = exit_token.child_token();
                Some(tokio::spawn(async move {
                    let mut sink = WriterSink::new(pipe);
                    pump.run(&mut reader, &mut sink, Some(&token)).await
                }))
            }
            None => None,
        };

        let outcome = CancellationBridge::new(command, cancel)
            .kill_group(spec.uses_process_group())
            .wait(&mut child)
            .await;
        exit_token.cancel();

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                for task in outputs.iter().chain(input.iter()) {
                    task.abort();
                }
                return Err(err);
            }
        };

        let deadline = match outcome {
            LaunchOutcome::Killed { .. } => Some(Instant::now() + self.drain_grace),
            LaunchOutcome::Exited { .. } => None,
        };
        let mut first_err = None;
        for mut task in outputs {
            let joined = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, &mut task).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        task.abort();
                        warn!(target: "runcx.process", command, "output still open after kill, keeping what was captured");
                        continue;
                    }
                },
                None => task.await,
            };
            match joined {
                Ok(Ok(copied)) => trace!(target: "runcx.process", command, copied, "output pump finished"),
                Ok(Err(err)) => {
                    first_err.get_or_insert(ProcessError::Io(err));
                }
                Err(join) => {
                    first_err.get_or_insert(ProcessError::Task(join));
                }
            }
        }

        if let Some(task) = input {
            match task.await {
                Ok(Ok(copied)) => trace!(target: "runcx.process", command, copied, "input pump finished"),
                Ok(Err(err)) if is_expected_input_stop(&err) => {
                    trace!(target: "runcx.process", command, error = %err, "input pump stopped")
                }
                Ok(Err(err)) => {
                    warn!(target: "runcx.process", command, error = %err, "input pump failed");
                    first_err.get_or_insert(ProcessError::Io(err));
                }
                Err(join) => {
                    first_err.get_or_insert(ProcessError::Task(join));
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(outcome),
        }
    }
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

fn check_wiring(stream: &str, mode: StdioMode, attached: bool) -> Result<(), ProcessError> {
    match (mode, attached) {
        (StdioMode::Piped, false) => Err(ProcessError::InvalidSpec(format!(
            "{stream} is piped but nothing is attached to it"
        ))),
        (StdioMode::Null | StdioMode::Inherit, true) => Err(ProcessError::InvalidSpec(format!(
            "{stream} has an attachment but is not piped"
        ))),
        _ => Ok(()),
    }
}

fn missing_pipe(stream: &str) -> ProcessError {
    ProcessError::InvalidSpec(format!("{stream} pipe was not created"))
}

/// The child may exit without reading all of its input.
fn is_expected_input_stop(err: &PumpError) -> bool {
    match err {
        PumpError::Cancelled { .. } => true,
        PumpError::Write { source, .. } => source.kind() == std::io::ErrorKind::BrokenPipe,
        PumpError::Read { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runcx_fanout::CapturedOutput;

    #[test]
    fn wiring_must_match_attachments() {
        assert!(check_wiring("stdout", StdioMode::Piped, true).is_ok());
        assert!(check_wiring("stdout", StdioMode::Inherit, false).is_ok());
        assert!(check_wiring("stdout", StdioMode::Piped, false).is_err());
        assert!(check_wiring("stdout", StdioMode::Null, true).is_err());
    }

    #[test]
    fn cancelled_and_broken_pipe_input_are_expected() {
        assert!(is_expected_input_stop(&PumpError::Cancelled {
            stream: "stdin",
            copied: 0
        }));
        assert!(is_expected_input_stop(&PumpError::Write {
            stream: "stdin",
            source: std::io::ErrorKind::BrokenPipe.into(),
        }));
        assert!(!is_expected_input_stop(&PumpError::Read {
            stream: "stdin",
            source: std::io::Error::other("disk"),
        }));
    }

    #[tokio::test]
    async fn unattached_pipe_is_rejected_before_spawn() {
        let spec = ProcessSpec::new("definitely-not-run");
        let err = ProcessLauncher::new()
            .launch(&spec, Attachments::default(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::InvalidSpec(_)));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let mut spec = ProcessSpec::new("runcx-no-such-program-4242");
        spec.stdout = StdioMode::Null;
        spec.stderr = StdioMode::Null;
        let err = ProcessLauncher::new()
            .launch(&spec, Attachments::default(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_and_stderr_are_pumped() {
        let out = CapturedOutput::new();
        let err = CapturedOutput::new();
        let mut spec = ProcessSpec::new("sh");
        spec.args = vec!["-c".into(), "printf out; printf err >&2".into()];
        let attachments = Attachments {
            stdout: Some(SinkHandle::new(out.clone())),
            stderr: Some(SinkHandle::new(err.clone())),
            stdin: None,
        };
        let outcome = ProcessLauncher::new()
            .launch(&spec, attachments, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, LaunchOutcome::Exited { exit_code: 0 });
        assert_eq!(out.bytes(), b"out");
        assert_eq!(err.bytes(), b"err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdin_is_fed_and_closed() {
        let out = CapturedOutput::new();
        let mut spec = ProcessSpec::new("cat");
        spec.stdin = StdioMode::Piped;
        spec.stderr = StdioMode::Null;
        let attachments = Attachments {
            stdout: Some(SinkHandle::new(out.clone())),
            stderr: None,
            stdin: Some(Box::new(&b"line one\nline two\n"[..])),
        };
        let outcome = ProcessLauncher::new()
            .buffer_size(4)
            .launch(&spec, attachments, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, LaunchOutcome::Exited { exit_code: 0 });
        assert_eq!(out.bytes(), b"line one\nline two\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unread_stdin_is_not_an_error() {
        let (_writer, reader) = tokio::io::duplex(16);
        let mut spec = ProcessSpec::new("true");
        spec.stdin = StdioMode::Piped;
        spec.stdout = StdioMode::Null;
        spec.stderr = StdioMode::Null;
        let attachments = Attachments {
            stdin: Some(Box::new(reader)),
            ..Default::default()
        };
        let outcome = ProcessLauncher::new()
            .launch(&spec, attachments, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, LaunchOutcome::Exited { exit_code: 0 });
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn drain_after_kill_is_bounded() {
        // Inherited stdin keeps the child in our process group, so the
        // grandchild `sleep` survives the kill and holds stdout open.
        let out = CapturedOutput::new();
        let mut spec = ProcessSpec::new("sh");
        spec.args = vec!["-c".into(), "echo started; sleep 30; echo done".into()];
        spec.stdin = StdioMode::Inherit;
        spec.stderr = StdioMode::Null;
        let attachments = Attachments {
            stdout: Some(SinkHandle::new(out.clone())),
            ..Default::default()
        };
        let token = CancelToken::new();
        token.cancel_after(Duration::from_millis(300));

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            ProcessLauncher::new()
                .drain_grace(Duration::from_millis(200))
                .launch(&spec, attachments, &token),
        )
        .await
        .expect("launch should return once the grace runs out")
        .unwrap();

        assert!(matches!(outcome, LaunchOutcome::Killed { .. }));
        assert_eq!(out.bytes(), b"started\n");
    }
}
