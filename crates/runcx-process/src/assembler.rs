// SPDX-License-Identifier: MIT OR Apache-2.0
//! Turning a launch into an [`ExecutionResult`].

use runcx_cancel::CancelToken;
use runcx_fanout::{CapturedOutput, FanoutSink, Sink, SinkHandle};
use tracing::{debug, info, warn};

use crate::bridge::{CancellationPolicy, LaunchOutcome};
use crate::error::ProcessError;
use crate::input::InputSource;
use crate::launcher::{Attachments, ProcessLauncher};
use crate::result::ExecutionResult;
use crate::spec::{ProcessSpec, StdioMode};

/// Exit codes treated as success when none are configured.
pub const DEFAULT_SUCCESS_CODES: &[i32] = &[0];

/// Classify a finished process against an allow-list of exit codes.
pub fn classify(
    command: &str,
    exit_code: i32,
    output: String,
    success_codes: &[i32],
) -> Result<ExecutionResult, ProcessError> {
    if success_codes.contains(&exit_code) {
        Ok(ExecutionResult { exit_code, output })
    } else {
        Err(ProcessError::NonZeroExit {
            command: command.to_string(),
            exit_code,
            output,
        })
    }
}

/// Wraps a [`ProcessLauncher`] with output capture and exit classification.
///
/// Stdout always goes to an internal capture. Stderr goes to the same
/// capture unless [`separate_stderr`](Self::separate_stderr) is set, in which
/// case it reaches only the stderr echo sink, or is inherited when there is
/// none.
#[derive(Debug, Clone)]
pub struct ResultAssembler {
    launcher: ProcessLauncher,
    success_codes: Vec<i32>,
    policy: CancellationPolicy,
    separate_stderr: bool,
    stdout_echo: Option<SinkHandle>,
    stderr_echo: Option<SinkHandle>,
    tees: Vec<SinkHandle>,
    echo_prompt: Option<String>,
}

impl ResultAssembler {
    /// Assembler around `launcher` with default settings.
    pub fn new(launcher: ProcessLauncher) -> Self {
        Self {
            launcher,
            success_codes: DEFAULT_SUCCESS_CODES.to_vec(),
            policy: CancellationPolicy::default(),
            separate_stderr: false,
            stdout_echo: None,
            stderr_echo: None,
            tees: Vec::new(),
            echo_prompt: None,
        }
    }

    /// Exit codes that count as success.
    pub fn success_codes(mut self, codes: Vec<i32>) -> Self {
        self.success_codes = codes;
        self
    }

    /// How a kill caused by cancellation is reported.
    pub fn policy(mut self, policy: CancellationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Keep stderr out of the captured output.
    pub fn separate_stderr(mut self, separate: bool) -> Self {
        self.separate_stderr = separate;
        self
    }

    /// Borrowed sink that sees stdout live. It is never closed.
    pub fn stdout_echo(mut self, sink: Option<SinkHandle>) -> Self {
        self.stdout_echo = sink;
        self
    }

    /// Borrowed sink that sees stderr live. It is never closed.
    pub fn stderr_echo(mut self, sink: Option<SinkHandle>) -> Self {
        self.stderr_echo = sink;
        self
    }

    /// Owned sinks that receive a copy of stdout and are closed after the run.
    pub fn tees(mut self, tees: Vec<SinkHandle>) -> Self {
        self.tees = tees;
        self
    }

    /// Prefix for the command line echoed before launch.
    pub fn echo_prompt(mut self, prompt: Option<String>) -> Self {
        self.echo_prompt = prompt;
        self
    }

    /// Launch `spec`, capture its output and classify the result.
    ///
    /// The [`ProcessSpec`] stdio modes are derived from the attached sinks and
    /// `stdin`; whatever the caller set there is overwritten.
    pub async fn run(
        &self,
        mut spec: ProcessSpec,
        stdin: InputSource,
        cancel: &CancelToken,
    ) -> Result<ExecutionResult, ProcessError> {
        if self.success_codes.is_empty() {
            return Err(ProcessError::InvalidSpec(
                "no exit code counts as success".into(),
            ));
        }

        spec.stdin = stdin.mode();
        let input = stdin.into_reader(spec.input_encoding)?;

        let capture = CapturedOutput::new();
        let capture_handle = SinkHandle::labelled("capture", capture.clone());

        let mut stdout_fan = FanoutSink::new();
        stdout_fan.bind(capture_handle.clone()).await.map_err(disposed)?;
        if let Some(echo) = &self.stdout_echo {
            stdout_fan.with(echo.clone()).map_err(disposed)?;
        }
        for tee in &self.tees {
            stdout_fan.bind(tee.clone()).await.map_err(disposed)?;
        }
        let mut stdout = SinkHandle::labelled("stdout", stdout_fan);

        let (stderr_sink, mut stderr_fan) = if self.separate_stderr {
            (self.stderr_echo.clone(), None)
        } else {
            let mut fan = FanoutSink::new();
            fan.with(capture_handle).map_err(disposed)?;
            if let Some(echo) = &self.stderr_echo {
                fan.with(echo.clone()).map_err(disposed)?;
            }
            let fan = SinkHandle::labelled("stderr", fan);
            (Some(fan.clone()), Some(fan))
        };

        spec.stdout = StdioMode::Piped;
        spec.stderr = if stderr_sink.is_some() {
            StdioMode::Piped
        } else {
            StdioMode::Inherit
        };
        self.echo_command(&spec).await;

        let attachments = Attachments {
            stdout: Some(stdout.clone()),
            stderr: stderr_sink,
            stdin: input,
        };
        let launched = self.launcher.launch(&spec, attachments, cancel).await;

        close_fan(&mut stdout).await;
        if let Some(fan) = stderr_fan.as_mut() {
            close_fan(fan).await;
        }
        let outcome = launched?;

        let bytes = capture.take();
        match outcome {
            LaunchOutcome::Exited { exit_code } => {
                debug!(target: "runcx.process", command = %spec.command, exit_code, bytes = bytes.len(), "classifying exit");
                // Only a successful run reports undecodable output; failures keep their exit code.
                let output = if self.success_codes.contains(&exit_code) {
                    spec.output_encoding.decode(&bytes)?
                } else {
                    spec.output_encoding.decode_lossy(&bytes)
                };
                classify(&spec.command, exit_code, output, &self.success_codes)
            }
            LaunchOutcome::Killed { .. } => Err(self.policy.apply(ProcessError::Killed {
                command: spec.command,
                output: spec.output_encoding.decode_lossy(&bytes),
            })),
        }
    }

    async fn echo_command(&self, spec: &ProcessSpec) {
        let Some(prompt) = &self.echo_prompt else {
            return;
        };
        let line = format!("{prompt}{}", spec.command_line());
        match &self.stdout_echo {
            Some(echo) => {
                let mut echo = echo.clone();
                if let Err(err) = echo.write_line(&line).await {
                    warn!(target: "runcx.process", error = %err, "failed to echo command line");
                }
            }
            None => info!(target: "runcx.process", "{line}"),
        }
    }
}

/// Flush the fan-out and close the sinks it owns.
async fn close_fan(fan: &mut SinkHandle) {
    if let Err(err) = fan.close().await {
        warn!(target: "runcx.process", sink = fan.label(), error = %err, "failed to release output sinks");
    }
}

fn disposed(err: std::io::Error) -> ProcessError {
    ProcessError::InvalidSpec(format!("output sink unavailable: {err}"))
}
