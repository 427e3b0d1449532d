// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error taxonomy for process launches.

use runcx_pump::PumpError;
use thiserror::Error;

/// Failures surfaced by [`Cmd::run`](crate::Cmd::run) and the launcher.
///
/// Every failure kind is its own variant so callers can branch on it without
/// inspecting messages.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The OS could not create the process.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        /// Program that was requested.
        command: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The process ran to completion with an exit code outside the allow-list.
    #[error("`{command}` exited with code {exit_code}")]
    NonZeroExit {
        /// Program that ran.
        command: String,
        /// Exit code reported by the OS.
        exit_code: i32,
        /// Everything captured before exit.
        output: String,
    },

    /// Cancellation fired before the process exited, so it was killed.
    #[error("`{command}` was killed after cancellation was requested")]
    Killed {
        /// Program that was killed.
        command: String,
        /// Output captured up to the kill.
        output: String,
    },

    /// A [`Killed`](ProcessError::Killed) outcome reported as a plain cancellation.
    #[error("operation cancelled")]
    Cancelled {
        /// The kill that caused the cancellation.
        #[source]
        source: Box<ProcessError>,
    },

    /// Reading or writing one of the redirected streams failed.
    #[error(transparent)]
    Io(#[from] PumpError),

    /// Waiting for the process or killing it failed.
    #[error("failed to wait for `{command}`: {source}")]
    Wait {
        /// Program being waited on.
        command: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A pump task panicked or was aborted.
    #[error("stream task failed: {0}")]
    Task(#[source] tokio::task::JoinError),

    /// Text could not be converted with the configured encoding.
    #[error("{0}")]
    Encoding(#[from] crate::encoding::EncodingError),

    /// The launch configuration is inconsistent.
    #[error("invalid launch configuration: {0}")]
    InvalidSpec(String),
}

impl ProcessError {
    /// Captured output carried by the error, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            ProcessError::NonZeroExit { output, .. } | ProcessError::Killed { output, .. } => {
                Some(output)
            }
            ProcessError::Cancelled { source } => source.output(),
            _ => None,
        }
    }

    /// Exit code of a completed process, if the error carries one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::NonZeroExit { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Returns `true` for [`Killed`](ProcessError::Killed) and
    /// [`Cancelled`](ProcessError::Cancelled).
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            ProcessError::Killed { .. } | ProcessError::Cancelled { .. }
        )
    }
}
