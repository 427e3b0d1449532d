// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reconciling caller cancellation with OS process termination.

use runcx_cancel::CancelToken;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::ExitStatus;
use std::str::FromStr;
use tokio::process::Child;
use tracing::{debug, warn};

use crate::error::ProcessError;

/// What happens to a kill caused by cancellation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CancellationPolicy {
    /// Report [`ProcessError::Killed`] with the partial output.
    #[default]
    KillOnly,
    /// Report [`ProcessError::Cancelled`] wrapping the kill.
    #[serde(alias = "convert")]
    ConvertToCancelled,
}

impl CancellationPolicy {
    /// Apply the policy to a [`ProcessError::Killed`].
    ///
    /// Other errors pass through unchanged.
    pub fn apply(self, err: ProcessError) -> ProcessError {
        match (self, err) {
            (CancellationPolicy::ConvertToCancelled, killed @ ProcessError::Killed { .. }) => {
                ProcessError::Cancelled {
                    source: Box::new(killed),
                }
            }
            (_, err) => err,
        }
    }

    /// Canonical name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            CancellationPolicy::KillOnly => "kill-only",
            CancellationPolicy::ConvertToCancelled => "convert-to-cancelled",
        }
    }
}

impl fmt::Display for CancellationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CancellationPolicy {
    type Err = ProcessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kill-only" => Ok(CancellationPolicy::KillOnly),
            "convert" | "convert-to-cancelled" => Ok(CancellationPolicy::ConvertToCancelled),
            other => Err(ProcessError::InvalidSpec(format!(
                "unknown cancellation policy '{other}'"
            ))),
        }
    }
}

/// Lifecycle of one launch, as reported in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    /// Building the command and spawning.
    Starting,
    /// Spawned; waiting for exit or cancellation.
    Running,
    /// Ran to completion.
    Exited,
    /// Terminated because cancellation fired first.
    Killed,
}

/// How a launch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The process exited on its own.
    Exited {
        /// Exit code; `128 + signal` for signal deaths on unix.
        exit_code: i32,
    },
    /// Cancellation fired first; the process was killed and reaped.
    Killed {
        /// OS process id, if it was known.
        pid: Option<u32>,
    },
}

impl LaunchOutcome {
    /// The terminal [`LaunchState`] for this outcome.
    pub fn state(&self) -> LaunchState {
        match self {
            LaunchOutcome::Exited { .. } => LaunchState::Exited,
            LaunchOutcome::Killed { .. } => LaunchState::Killed,
        }
    }
}

/// Numeric exit code for a finished process.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Races a child's exit against a cancellation token.
#[derive(Debug)]
pub struct CancellationBridge<'a> {
    command: &'a str,
    token: &'a CancelToken,
    kill_group: bool,
}

impl<'a> CancellationBridge<'a> {
    /// Bridge for the process started from `command`.
    pub fn new(command: &'a str, token: &'a CancelToken) -> Self {
        Self {
            command,
            token,
            kill_group: false,
        }
    }

    /// Also kill the process group the child leads when cancelling.
    ///
    /// Only meaningful for a child started with
    /// [`ProcessSpec::uses_process_group`](crate::ProcessSpec::uses_process_group).
    pub fn kill_group(mut self, kill_group: bool) -> Self {
        self.kill_group = kill_group;
        self
    }

    /// Wait for `child` to exit, killing it if the token fires first.
    ///
    /// An exit that is already available wins over a cancellation that
    /// arrives in the same poll. A killed child is always reaped before this
    /// returns.
    pub async fn wait(&self, child: &mut Child) -> Result<LaunchOutcome, ProcessError> {
        let pid = child.id();
        let exited = tokio::select! {
            biased;
            status = child.wait() => Some(status),
            _ = self.token.cancelled() => None,
        };

        match exited {
            Some(status) => {
                let status = status.map_err(|source| self.wait_error(source))?;
                let exit_code = exit_code_of(status);
                debug!(target: "runcx.process", command = self.command, ?pid, exit_code, state = ?LaunchState::Exited, "process exited");
                Ok(LaunchOutcome::Exited { exit_code })
            }
            None => {
                // Exited but not yet reaped: signalling it would still succeed.
                if let Ok(Some(status)) = child.try_wait() {
                    let exit_code = exit_code_of(status);
                    debug!(target: "runcx.process", command = self.command, ?pid, exit_code, state = ?LaunchState::Exited, "process exited before cancellation");
                    return Ok(LaunchOutcome::Exited { exit_code });
                }
                debug!(target: "runcx.process", command = self.command, ?pid, "cancellation requested, killing process");
                #[cfg(unix)]
                if self.kill_group
                    && let Some(pgid) = pid
                {
                    self.signal_group(pgid);
                }
                match child.kill().await {
                    Ok(()) => {
                        debug!(target: "runcx.process", command = self.command, ?pid, state = ?LaunchState::Killed, "process killed");
                        Ok(LaunchOutcome::Killed { pid })
                    }
                    Err(source) => match child.try_wait() {
                        // Exited between the cancellation and the kill.
                        Ok(Some(status)) => Ok(LaunchOutcome::Exited {
                            exit_code: exit_code_of(status),
                        }),
                        _ => {
                            warn!(target: "runcx.process", command = self.command, ?pid, error = %source, "failed to kill process");
                            Err(self.wait_error(source))
                        }
                    },
                }
            }
        }
    }

    #[cfg(unix)]
    fn signal_group(&self, pgid: u32) {
        match kill_process_group(pgid) {
            Ok(()) => {
                debug!(target: "runcx.process", command = self.command, pgid, "process group killed")
            }
            Err(err) if err.raw_os_error() == Some(libc::ESRCH) => {
                debug!(target: "runcx.process", command = self.command, pgid, "process group already gone")
            }
            Err(err) => {
                warn!(target: "runcx.process", command = self.command, pgid, error = %err, "failed to kill process group")
            }
        }
    }

    fn wait_error(&self, source: std::io::Error) -> ProcessError {
        ProcessError::Wait {
            command: self.command.to_string(),
            source,
        }
    }
}

/// Send `SIGKILL` to every process in the group `pgid`.
#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_process_group(pgid: u32) -> std::io::Result<()> {
    let pgid = libc::pid_t::try_from(pgid)
        .map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidInput))?;
    // SAFETY: killpg takes plain integers and touches no memory.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}
