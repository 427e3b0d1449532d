// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! runcx-process
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod assembler;
pub mod bridge;
pub mod cmd;
pub mod encoding;
pub mod error;
pub mod input;
pub mod launcher;
pub mod quote;
pub mod result;
pub mod spec;

pub use assembler::{DEFAULT_SUCCESS_CODES, ResultAssembler, classify};
pub use bridge::{CancellationBridge, CancellationPolicy, LaunchOutcome, LaunchState, exit_code_of};
pub use cmd::Cmd;
pub use encoding::{EncodingError, TextEncoding};
pub use error::ProcessError;
pub use input::{InputReader, InputSource};
pub use launcher::{Attachments, ProcessLauncher};
pub use quote::{join_args, quote_arg};
pub use result::ExecutionResult;
pub use spec::{ProcessSpec, StdioMode};

pub use runcx_cancel::CancelToken;
pub use runcx_fanout::{CapturedOutput, FanoutSink, Sink, SinkHandle, WriterSink};
