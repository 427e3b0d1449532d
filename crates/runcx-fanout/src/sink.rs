// SPDX-License-Identifier: MIT OR Apache-2.0
//! The byte sink contract shared by pumps and fan-outs.

use async_trait::async_trait;
use std::io;

/// Asynchronous destination for bytes.
///
/// Implementations are not required to be internally synchronised; wrap a
/// sink in a [`SinkHandle`](crate::SinkHandle) to share it between tasks.
#[async_trait]
pub trait Sink: Send {
    /// Write the whole buffer.
    async fn write(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Flush buffered data to the underlying destination.
    async fn flush(&mut self) -> io::Result<()>;

    /// Flush and release the underlying destination. Closing twice is a no-op.
    async fn close(&mut self) -> io::Result<()>;

    /// Write UTF-8 text.
    async fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.write(text.as_bytes()).await
    }

    /// Write UTF-8 text followed by `\n`.
    async fn write_line(&mut self, text: &str) -> io::Result<()> {
        self.write(text.as_bytes()).await?;
        self.write(b"\n").await
    }
}

#[async_trait]
impl<S: Sink + ?Sized> Sink for Box<S> {
    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write(buf).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        (**self).flush().await
    }

    async fn close(&mut self) -> io::Result<()> {
        (**self).close().await
    }
}
