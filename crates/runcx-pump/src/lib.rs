// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! runcx-pump
#![deny(unsafe_code)]
#![warn(missing_docs)]

use runcx_cancel::CancelToken;
use runcx_fanout::Sink;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

/// Errors from a pump run.
#[derive(Debug, Error)]
pub enum PumpError {
    /// Reading the source failed.
    #[error("failed to read {stream}: {source}")]
    Read {
        /// Pump label.
        stream: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing, flushing or closing the sink failed.
    #[error("failed to write {stream}: {source}")]
    Write {
        /// Pump label.
        stream: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The cancellation token fired before the source was drained.
    #[error("{stream} pump cancelled after {copied} bytes")]
    Cancelled {
        /// Pump label.
        stream: &'static str,
        /// Bytes written by rounds that completed before cancellation.
        copied: u64,
    },
}

impl PumpError {
    /// Returns `true` for [`PumpError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PumpError::Cancelled { .. })
    }
}

/// Asynchronous copy loop from one source to one sink.
#[derive(Debug, Clone)]
pub struct StreamPump {
    buffer_size: usize,
    close_on_eof: bool,
    label: &'static str,
}

impl StreamPump {
    /// Size of each of the two buffers unless configured otherwise.
    pub const DEFAULT_BUFFER_SIZE: usize = 4096;

    /// Pump with default buffers that leaves the sink open at end of data.
    pub fn new(label: &'static str) -> Self {
        Self {
            buffer_size: Self::DEFAULT_BUFFER_SIZE,
            close_on_eof: false,
            label,
        }
    }

    /// Set the size of each buffer. Zero is raised to one.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Close the sink once the source reports end of data.
    pub fn close_on_eof(mut self, close: bool) -> Self {
        self.close_on_eof = close;
        self
    }

    /// Label used in logs and errors.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Copy `source` into `sink` until the source reads zero bytes.
    ///
    /// Each round reads into the spare buffer while the previously filled
    /// buffer is written, and waits for that write before the buffers swap.
    /// When `cancel` fires the in-flight round is abandoned and
    /// [`PumpError::Cancelled`] is returned; pumps that must not lose data
    /// pass `None`.
    ///
    /// Returns the number of bytes written to the sink.
    pub async fn run<R, S>(
        &self,
        source: &mut R,
        sink: &mut S,
        cancel: Option<&CancelToken>,
    ) -> Result<u64, PumpError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
        S: Sink + ?Sized,
    {
        let stream = self.label;
        let mut filled = vec![0u8; self.buffer_size];
        let mut spare = vec![0u8; self.buffer_size];
        let mut pending = 0usize;
        let mut copied = 0u64;

        trace!(target: "runcx.pump", stream, buffer_size = self.buffer_size, "pump started");

        loop {
            let round = async {
                let write = async {
                    if pending == 0 {
                        Ok(())
                    } else {
                        sink.write(&filled[..pending]).await
                    }
                };
                tokio::join!(source.read(&mut spare), write)
            };

            let (read, written) = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!(target: "runcx.pump", stream, copied, "pump cancelled");
                        return Err(PumpError::Cancelled { stream, copied });
                    }
                    res = round => res,
                },
                None => round.await,
            };

            written.map_err(|source| PumpError::Write { stream, source })?;
            copied += pending as u64;

            let n = read.map_err(|source| PumpError::Read { stream, source })?;
            if n == 0 {
                break;
            }
            std::mem::swap(&mut filled, &mut spare);
            pending = n;
        }

        sink.flush()
            .await
            .map_err(|source| PumpError::Write { stream, source })?;
        if self.close_on_eof {
            sink.close()
                .await
                .map_err(|source| PumpError::Write { stream, source })?;
        }

        debug!(target: "runcx.pump", stream, copied, "pump drained");
        Ok(copied)
    }
}
