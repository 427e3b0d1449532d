// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared, serialising sink handles.

use async_trait::async_trait;
use runcx_dispose::{BoxError, Disposable};
use std::fmt;
use std::io;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{Sink, WriterSink};

/// A cloneable handle to a sink behind an async mutex.
///
/// Every write takes the lock, so a handle can be fed by several pumps at
/// once; each individual write stays contiguous. Equality is identity: two
/// handles are equal only if they are clones of the same handle.
#[derive(Clone)]
pub struct SinkHandle {
    inner: Arc<Mutex<dyn Sink>>,
    label: Arc<str>,
}

impl SinkHandle {
    /// Wrap `sink` in a new handle.
    pub fn new<S: Sink + 'static>(sink: S) -> Self {
        Self::labelled("sink", sink)
    }

    /// Wrap `sink` with a label used in logs and `Debug` output.
    pub fn labelled<S: Sink + 'static>(label: &str, sink: S) -> Self {
        let inner: Arc<Mutex<dyn Sink>> = Arc::new(Mutex::new(sink));
        Self {
            inner,
            label: Arc::from(label),
        }
    }

    /// Handle over this process's standard output.
    ///
    /// Meant to be attached as a borrowed member so it is never closed.
    pub fn stdout() -> Self {
        Self::labelled("stdout", WriterSink::new(tokio::io::stdout()))
    }

    /// Handle over this process's standard error.
    pub fn stderr() -> Self {
        Self::labelled("stderr", WriterSink::new(tokio::io::stderr()))
    }

    /// Label given at construction.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns `true` if both handles share the same sink.
    pub fn ptr_eq(&self, other: &SinkHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for SinkHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for SinkHandle {}

impl fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SinkHandle").field(&self.label).finish()
    }
}

#[async_trait]
impl Sink for SinkHandle {
    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.lock().await.write(buf).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().await.flush().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.inner.lock().await.close().await
    }
}

#[async_trait]
impl Disposable for SinkHandle {
    async fn dispose(&mut self) -> Result<(), BoxError> {
        self.close().await.map_err(Into::into)
    }
}
