// SPDX-License-Identifier: MIT OR Apache-2.0
//! Immutable description of one process launch.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use crate::encoding::TextEncoding;
use crate::error::ProcessError;
use crate::quote::join_args;

/// Windows `CREATE_NO_WINDOW` creation flag.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// How one standard stream of the child is wired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StdioMode {
    /// Connected to the null device.
    #[default]
    Null,
    /// Shared with the calling process.
    Inherit,
    /// Redirected through a pipe and pumped.
    Piped,
}

impl StdioMode {
    fn stdio(self) -> Stdio {
        match self {
            StdioMode::Null => Stdio::null(),
            StdioMode::Inherit => Stdio::inherit(),
            StdioMode::Piped => Stdio::piped(),
        }
    }
}

/// Everything needed to start a child process.
///
/// The launcher only ever borrows a spec, so it cannot change while a launch
/// is in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Program path or name looked up on `PATH`.
    pub command: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Working directory; the caller's when `None`.
    pub cwd: Option<PathBuf>,
    /// Environment overrides. `None` removes the variable.
    pub env: BTreeMap<String, Option<String>>,
    /// Start from the caller's environment before applying overrides.
    pub inherit_env: bool,
    /// Encoding of captured stdout and stderr.
    pub output_encoding: TextEncoding,
    /// Encoding of text fed to stdin.
    pub input_encoding: TextEncoding,
    /// Suppress the console window on Windows. Ignored elsewhere.
    pub no_window: bool,
    /// Wiring for stdin.
    pub stdin: StdioMode,
    /// Wiring for stdout.
    pub stdout: StdioMode,
    /// Wiring for stderr.
    pub stderr: StdioMode,
}

impl ProcessSpec {
    /// Spec for `command` with no arguments and captured output streams.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            inherit_env: true,
            output_encoding: TextEncoding::default(),
            input_encoding: TextEncoding::default(),
            no_window: false,
            stdin: StdioMode::Null,
            stdout: StdioMode::Piped,
            stderr: StdioMode::Piped,
        }
    }

    /// Split a command line into program and arguments.
    ///
    /// The program ends at the first run of whitespace; the rest is split on
    /// whitespace. Quotes carry no meaning here.
    pub fn from_command_line(line: &str) -> Result<Self, ProcessError> {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest),
            None => (line, ""),
        };
        if command.is_empty() {
            return Err(ProcessError::InvalidSpec("empty command line".into()));
        }
        let mut spec = Self::new(command);
        spec.args = rest.split_whitespace().map(str::to_string).collect();
        Ok(spec)
    }

    /// The command line, quoted for display.
    pub fn command_line(&self) -> String {
        join_args(&self.command, &self.args)
    }

    /// Check the fields the OS would otherwise reject obscurely.
    pub fn validate(&self) -> Result<(), ProcessError> {
        if self.command.trim().is_empty() {
            return Err(ProcessError::InvalidSpec("command is empty".into()));
        }
        if let Some(key) = self
            .env
            .keys()
            .find(|k| k.is_empty() || k.contains('=') || k.contains('\0'))
        {
            return Err(ProcessError::InvalidSpec(format!(
                "invalid environment variable name {key:?}"
            )));
        }
        Ok(())
    }

    /// Whether the child is started as the leader of its own process group.
    ///
    /// Only on unix, and never with inherited stdin: a child outside the
    /// terminal's foreground group is stopped when it reads from it.
    pub fn uses_process_group(&self) -> bool {
        cfg!(unix) && self.stdin != StdioMode::Inherit
    }

    /// Build the OS command for this spec.
    pub fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        if !self.inherit_env {
            cmd.env_clear();
        }
        for (key, value) in &self.env {
            match value {
                Some(value) => {
                    cmd.env(key, value);
                }
                None => {
                    cmd.env_remove(key);
                }
            }
        }
        cmd.stdin(self.stdin.stdio())
            .stdout(self.stdout.stdio())
            .stderr(self.stderr.stdio())
            .kill_on_drop(true);

        #[cfg(unix)]
        if self.uses_process_group() {
            cmd.process_group(0);
        }

        #[cfg(windows)]
        if self.no_window {
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_splits_on_first_whitespace() {
        let spec = ProcessSpec::from_command_line("  git   log  --oneline -n 3 ").unwrap();
        assert_eq!(spec.command, "git");
        assert_eq!(spec.args, ["log", "--oneline", "-n", "3"]);
    }

    #[test]
    fn bare_command_has_no_args() {
        let spec = ProcessSpec::from_command_line("ls").unwrap();
        assert_eq!(spec.command, "ls");
        assert!(spec.args.is_empty());
    }

    #[test]
    fn quotes_are_not_interpreted() {
        let spec = ProcessSpec::from_command_line(r#"echo "a b""#).unwrap();
        assert_eq!(spec.args, [r#""a"#, r#"b""#]);
    }

    #[test]
    fn empty_command_line_is_rejected() {
        let err = ProcessSpec::from_command_line("   ").unwrap_err();
        assert!(matches!(err, ProcessError::InvalidSpec(_)));
    }

    #[test]
    fn defaults_capture_output_and_inherit_env() {
        let spec = ProcessSpec::new("true");
        assert!(spec.inherit_env);
        assert_eq!(spec.stdin, StdioMode::Null);
        assert_eq!(spec.stdout, StdioMode::Piped);
        assert_eq!(spec.stderr, StdioMode::Piped);
    }

    #[test]
    fn validate_rejects_bad_env_names() {
        let mut spec = ProcessSpec::new("true");
        spec.env.insert("A=B".into(), Some("x".into()));
        assert!(matches!(spec.validate(), Err(ProcessError::InvalidSpec(_))));
    }

    #[test]
    fn command_line_is_quoted() {
        let mut spec = ProcessSpec::new("echo");
        spec.args = vec!["hello world".into(), "x".into()];
        assert_eq!(spec.command_line(), r#"echo "hello world" x"#);
    }

    #[cfg(unix)]
    #[test]
    fn own_process_group_unless_stdin_is_inherited() {
        let mut spec = ProcessSpec::new("true");
        assert!(spec.uses_process_group());
        spec.stdin = StdioMode::Inherit;
        assert!(!spec.uses_process_group());
    }
}
