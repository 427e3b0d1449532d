// SPDX-License-Identifier: MIT OR Apache-2.0
//! Chainable launch configuration.

use runcx_cancel::CancelToken;
use runcx_config::RunConfig;
use runcx_fanout::SinkHandle;
use std::path::PathBuf;
use std::time::Duration;

use crate::assembler::{DEFAULT_SUCCESS_CODES, ResultAssembler};
use crate::bridge::CancellationPolicy;
use crate::encoding::TextEncoding;
use crate::error::ProcessError;
use crate::input::InputSource;
use crate::launcher::ProcessLauncher;
use crate::result::ExecutionResult;
use crate::spec::{ProcessSpec, StdioMode};

/// A process launch, configured by chaining.
///
/// Every configuration method consumes the builder and returns the updated
/// value; nothing is shared or mutated behind the caller's back.
/// [`spec`](Cmd::spec) is the pure view of what would be started and
/// [`run`](Cmd::run) starts it.
#[derive(Debug)]
#[must_use = "a Cmd does nothing until `run` is awaited"]
pub struct Cmd {
    spec: ProcessSpec,
    stdin: InputSource,
    stdout: Option<SinkHandle>,
    stderr: Option<SinkHandle>,
    tees: Vec<SinkHandle>,
    echo_prompt: Option<String>,
    success_codes: Vec<i32>,
    cancel: Option<CancelToken>,
    timeout: Option<Duration>,
    policy: CancellationPolicy,
    buffer_size: usize,
    separate_stderr: bool,
}

impl Cmd {
    /// Launch `command` with no arguments.
    pub fn new(command: impl Into<String>) -> Self {
        Self::from_spec(ProcessSpec::new(command))
    }

    /// Launch a command line split on whitespace.
    ///
    /// An empty line is reported by [`run`](Cmd::run).
    pub fn parse(command_line: &str) -> Self {
        let spec = ProcessSpec::from_command_line(command_line)
            .unwrap_or_else(|_| ProcessSpec::new(String::new()));
        Self::from_spec(spec)
    }

    fn from_spec(spec: ProcessSpec) -> Self {
        Self {
            spec,
            stdin: InputSource::Null,
            stdout: None,
            stderr: None,
            tees: Vec::new(),
            echo_prompt: None,
            success_codes: DEFAULT_SUCCESS_CODES.to_vec(),
            cancel: None,
            timeout: None,
            policy: CancellationPolicy::default(),
            buffer_size: runcx_pump::StreamPump::DEFAULT_BUFFER_SIZE,
            separate_stderr: false,
        }
    }

    /// Launch `command` with defaults taken from `config`.
    pub fn from_config(command: impl Into<String>, config: &RunConfig) -> Result<Self, ProcessError> {
        Self::new(command).with_config(config)
    }

    /// Apply the settings present in `config`; absent ones are left alone.
    pub fn with_config(mut self, config: &RunConfig) -> Result<Self, ProcessError> {
        if let Some(size) = config.buffer_size {
            self = self.buffer_size(size);
        }
        if let Some(codes) = &config.success_codes {
            self = self.success_codes(codes.iter().copied());
        }
        if let Some(policy) = &config.cancellation_policy {
            self = self.cancellation_policy(policy.parse()?);
        }
        if let Some(prompt) = &config.echo_prompt {
            self = self.echo_prompt(prompt.clone());
        }
        if let Some(inherit) = config.inherit_env {
            self = self.inherit_env(inherit);
        }
        for (key, value) in &config.env {
            self = self.env(key, value);
        }
        if let Some(millis) = config.timeout_ms {
            self = self.timeout(Duration::from_millis(millis));
        }
        if let Some(name) = &config.output_encoding {
            self = self.output_encoding(name.parse()?);
        }
        if let Some(name) = &config.input_encoding {
            self = self.input_encoding(name.parse()?);
        }
        if let Some(no_window) = config.no_window {
            self = self.no_window(no_window);
        }
        Ok(self)
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.spec.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Working directory of the child.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spec.cwd = Some(dir.into());
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.env.insert(key.into(), Some(value.into()));
        self
    }

    /// Remove an environment variable.
    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.spec.env.insert(key.into(), None);
        self
    }

    /// Start from the caller's environment (the default) or from an empty one.
    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.spec.inherit_env = inherit;
        self
    }

    /// Borrowed sink that sees stdout as it is produced.
    pub fn stdout(mut self, sink: SinkHandle) -> Self {
        self.stdout = Some(sink);
        self
    }

    /// Borrowed sink that sees stderr as it is produced.
    pub fn stderr(mut self, sink: SinkHandle) -> Self {
        self.stderr = Some(sink);
        self
    }

    /// Echo output live to this process's own stdout and stderr.
    pub fn echo(self) -> Self {
        self.stdout(SinkHandle::stdout()).stderr(SinkHandle::stderr())
    }

    /// Extra stdout sink that the run takes over and closes when it ends.
    pub fn tee(mut self, sink: SinkHandle) -> Self {
        self.tees.push(sink);
        self
    }

    /// Source of the child's stdin.
    pub fn stdin(mut self, source: impl Into<InputSource>) -> Self {
        self.stdin = source.into();
        self
    }

    /// Encoding of captured output.
    pub fn output_encoding(mut self, encoding: TextEncoding) -> Self {
        self.spec.output_encoding = encoding;
        self
    }

    /// Encoding of text passed to [`stdin`](Cmd::stdin).
    pub fn input_encoding(mut self, encoding: TextEncoding) -> Self {
        self.spec.input_encoding = encoding;
        self
    }

    /// Suppress the console window on Windows.
    pub fn no_window(mut self, no_window: bool) -> Self {
        self.spec.no_window = no_window;
        self
    }

    /// Print `prompt` followed by the command line before launching.
    pub fn echo_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.echo_prompt = Some(prompt.into());
        self
    }

    /// Exit codes that count as success. Defaults to `[0]`.
    pub fn success_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.success_codes = codes.into_iter().collect();
        self
    }

    /// Token that kills the child when cancelled.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Kill the child if it is still running after `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// How a kill caused by cancellation is reported.
    pub fn cancellation_policy(mut self, policy: CancellationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Size of each pump buffer. Zero is raised to one.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Keep stderr out of the captured output.
    pub fn separate_stderr(mut self, separate: bool) -> Self {
        self.separate_stderr = separate;
        self
    }

    /// The process this builder would start.
    pub fn spec(&self) -> ProcessSpec {
        let mut spec = self.spec.clone();
        spec.stdin = self.stdin.mode();
        spec.stderr = if self.separate_stderr && self.stderr.is_none() {
            StdioMode::Inherit
        } else {
            StdioMode::Piped
        };
        spec
    }

    /// The command line, quoted for display.
    pub fn command_line(&self) -> String {
        self.spec.command_line()
    }

    /// Start the process and wait for it.
    ///
    /// A configured timeout only cancels this run; the caller's token is
    /// never cancelled by it.
    pub async fn run(self) -> Result<ExecutionResult, ProcessError> {
        let parent = self.cancel.unwrap_or_default();
        let token = match self.timeout {
            Some(timeout) => {
                let token = parent.child_token();
                token.cancel_after(timeout);
                Some(token)
            }
            None => None,
        };

        let assembler = ResultAssembler::new(ProcessLauncher::new().buffer_size(self.buffer_size))
            .success_codes(self.success_codes)
            .policy(self.policy)
            .separate_stderr(self.separate_stderr)
            .stdout_echo(self.stdout)
            .stderr_echo(self.stderr)
            .tees(self.tees)
            .echo_prompt(self.echo_prompt);

        let result = assembler
            .run(self.spec, self.stdin, token.as_ref().unwrap_or(&parent))
            .await;
        if let Some(token) = token {
            // Ends the deadline timer.
            token.cancel();
        }
        result
    }
}
