// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error markers carried inside [`std::io::Error`].

use std::io;
use thiserror::Error;

/// A [`FanoutSink`](crate::FanoutSink) was used after it was disposed.
#[derive(Debug, Error)]
#[error("fan-out sink used after dispose")]
pub struct SinkDisposed;

/// A sink was written to after it was closed.
#[derive(Debug, Error)]
#[error("sink already closed")]
pub struct SinkClosed;

pub(crate) fn disposed() -> io::Error {
    io::Error::other(SinkDisposed)
}

pub(crate) fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, SinkClosed)
}

/// Returns `true` if `err` reports use of a disposed fan-out sink.
pub fn is_disposed_error(err: &io::Error) -> bool {
    err.get_ref()
        .is_some_and(|inner| inner.downcast_ref::<SinkDisposed>().is_some())
}
