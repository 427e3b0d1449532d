// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! runcx-fanout
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Sinks are byte oriented; text is encoded by the caller before it reaches
//! them, and captured bytes are decoded once after a process finishes.

pub mod capture;
pub mod error;
pub mod fanout;
pub mod handle;
pub mod sink;
pub mod writer;

pub use capture::CapturedOutput;
pub use error::{SinkClosed, SinkDisposed, is_disposed_error};
pub use fanout::FanoutSink;
pub use handle::SinkHandle;
pub use sink::Sink;
pub use writer::WriterSink;
