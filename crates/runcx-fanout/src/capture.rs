// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory capture of pumped output.

use async_trait::async_trait;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::Sink;

/// Append-only byte accumulator.
///
/// Clones share the same buffer, so one clone can be handed to a fan-out
/// while another is kept to read the result once the process has finished.
#[derive(Clone, Default)]
pub struct CapturedOutput {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CapturedOutput {
    /// Create an empty capture.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of everything captured so far.
    pub fn bytes(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Take the captured bytes, leaving the capture empty.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of captured bytes.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Captured bytes as text, replacing invalid UTF-8.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }
}

impl std::fmt::Debug for CapturedOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedOutput")
            .field("len", &self.len())
            .finish()
    }
}

#[async_trait]
impl Sink for CapturedOutput {
    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.lock().extend_from_slice(buf);
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_the_buffer() {
        let capture = CapturedOutput::new();
        let mut writer = capture.clone();
        writer.write_str("hello ").await.unwrap();
        writer.write_line("world").await.unwrap();
        assert_eq!(capture.to_string_lossy(), "hello world\n");
        assert_eq!(capture.len(), 12);
    }

    #[tokio::test]
    async fn take_empties_the_capture() {
        let mut capture = CapturedOutput::new();
        capture.write(b"abc").await.unwrap();
        assert_eq!(capture.take(), b"abc");
        assert!(capture.is_empty());
    }

    #[tokio::test]
    async fn close_keeps_contents_readable() {
        let mut capture = CapturedOutput::new();
        capture.write(b"kept").await.unwrap();
        capture.close().await.unwrap();
        assert_eq!(capture.bytes(), b"kept");
    }
}
