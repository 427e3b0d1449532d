// SPDX-License-Identifier: MIT OR Apache-2.0
//! The data product of a successful run.

use serde::{Deserialize, Serialize};

/// Exit code and captured output of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Exit code reported by the OS.
    pub exit_code: i32,
    /// Captured output, decoded with the output encoding.
    pub output: String,
}

impl ExecutionResult {
    /// Build a result.
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    /// Returns `true` if the exit code is in `success_codes`.
    pub fn is_success_in(&self, success_codes: &[i32]) -> bool {
        success_codes.contains(&self.exit_code)
    }

    /// Captured output split into lines, without terminators.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines()
    }
}
