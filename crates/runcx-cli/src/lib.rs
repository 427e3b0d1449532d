// SPDX-License-Identifier: MIT OR Apache-2.0
//! Library half of the `runcx` binary, so commands can be tested without
//! spawning it.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod commands;
