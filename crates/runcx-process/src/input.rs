// SPDX-License-Identifier: MIT OR Apache-2.0
//! What feeds a child's stdin.

use std::fmt;
use std::io::Cursor;
use tokio::io::AsyncRead;

use crate::encoding::{EncodingError, TextEncoding};
use crate::spec::StdioMode;

/// Boxed reader that feeds a child's stdin.
pub type InputReader = Box<dyn AsyncRead + Send + Unpin>;

/// Source of a child's standard input.
#[derive(Default)]
pub enum InputSource {
    /// The child reads end of file immediately.
    #[default]
    Null,
    /// The child shares the caller's stdin directly, without a pump.
    Inherit,
    /// Fixed bytes, then end of file.
    Bytes(Vec<u8>),
    /// Text encoded with the input encoding, then end of file.
    Text(String),
    /// Any async reader, pumped until it is exhausted.
    Reader(InputReader),
}

impl InputSource {
    /// A reader over this process's standard input.
    ///
    /// Each call builds a fresh value; keep it and pass it on when several
    /// launches should share one console reader.
    pub fn console() -> Self {
        InputSource::Reader(Box::new(tokio::io::stdin()))
    }

    /// Wrap any async reader.
    pub fn reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        InputSource::Reader(Box::new(reader))
    }

    /// How the child's stdin must be wired for this source.
    pub fn mode(&self) -> StdioMode {
        match self {
            InputSource::Null => StdioMode::Null,
            InputSource::Inherit => StdioMode::Inherit,
            InputSource::Bytes(_) | InputSource::Text(_) | InputSource::Reader(_) => {
                StdioMode::Piped
            }
        }
    }

    /// Turn the source into the reader the stdin pump drains.
    ///
    /// Returns `None` for sources that need no pump.
    pub fn into_reader(self, encoding: TextEncoding) -> Result<Option<InputReader>, EncodingError> {
        Ok(match self {
            InputSource::Null | InputSource::Inherit => None,
            InputSource::Bytes(bytes) => Some(Box::new(Cursor::new(bytes))),
            InputSource::Text(text) => Some(Box::new(Cursor::new(encoding.encode(&text)?))),
            InputSource::Reader(reader) => Some(reader),
        })
    }
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Null => f.write_str("Null"),
            InputSource::Inherit => f.write_str("Inherit"),
            InputSource::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            InputSource::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            InputSource::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

impl From<Vec<u8>> for InputSource {
    fn from(bytes: Vec<u8>) -> Self {
        InputSource::Bytes(bytes)
    }
}

impl From<String> for InputSource {
    fn from(text: String) -> Self {
        InputSource::Text(text)
    }
}

impl From<&str> for InputSource {
    fn from(text: &str) -> Self {
        InputSource::Text(text.to_string())
    }
}
