// SPDX-License-Identifier: MIT OR Apache-2.0
//! Adapter from `tokio::io::AsyncWrite` to [`Sink`].

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::Sink;
use crate::error::closed;

/// A [`Sink`] over any tokio writer.
///
/// [`close`](Sink::close) shuts the writer down and drops it, which is what
/// actually closes pipe handles such as a child's stdin.
#[derive(Debug)]
pub struct WriterSink<W> {
    inner: Option<W>,
}

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    /// Wrap `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            inner: Some(writer),
        }
    }

    /// Returns `true` once the sink has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Recover the writer if the sink is still open.
    pub fn into_inner(self) -> Option<W> {
        self.inner
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Sink for WriterSink<W> {
    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(w) => w.write_all(buf).await,
            None => Err(closed()),
        }
    }

    async fn flush(&mut self) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(w) => w.flush().await,
            None => Ok(()),
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        let Some(mut w) = self.inner.take() else {
            return Ok(());
        };
        w.flush().await?;
        w.shutdown().await
    }
}
