// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! runcx-bytes
#![deny(unsafe_code)]
#![warn(missing_docs)]

use thiserror::Error;

/// Errors from reading past the end of a slice.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum BytesError {
    /// Fewer bytes remain than the read needs.
    #[error("unexpected end of input at offset {offset}: needed {needed} bytes, {available} available")]
    UnexpectedEnd {
        /// Offset the read started at.
        offset: usize,
        /// Bytes the read needed.
        needed: usize,
        /// Bytes left from `offset`.
        available: usize,
    },
}

/// A primitive that can be decoded from a fixed number of bytes.
pub trait FromBytes: Sized + Copy {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Decode little-endian bytes. `None` unless `bytes.len() == SIZE`.
    fn from_le_slice(bytes: &[u8]) -> Option<Self>;

    /// Decode big-endian bytes. `None` unless `bytes.len() == SIZE`.
    fn from_be_slice(bytes: &[u8]) -> Option<Self>;
}

macro_rules! impl_from_bytes {
    ($($t:ty),* $(,)?) => {$(
        impl FromBytes for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn from_le_slice(bytes: &[u8]) -> Option<Self> {
                bytes.try_into().ok().map(<$t>::from_le_bytes)
            }

            fn from_be_slice(bytes: &[u8]) -> Option<Self> {
                bytes.try_into().ok().map(<$t>::from_be_bytes)
            }
        }
    )*};
}

impl_from_bytes!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64);

fn take<'a>(bytes: &'a [u8], pos: usize, needed: usize) -> Result<&'a [u8], BytesError> {
    let end = pos.checked_add(needed);
    match end {
        Some(end) if end <= bytes.len() => Ok(&bytes[pos..end]),
        _ => Err(BytesError::UnexpectedEnd {
            offset: pos,
            needed,
            available: bytes.len().saturating_sub(pos),
        }),
    }
}

/// Read a little-endian `T` at `*pos`, advancing `pos` past it.
///
/// On error `pos` is left unchanged.
pub fn read_le<T: FromBytes>(bytes: &[u8], pos: &mut usize) -> Result<T, BytesError> {
    read_with(bytes, pos, T::from_le_slice)
}

/// Read a big-endian `T` at `*pos`, advancing `pos` past it.
///
/// On error `pos` is left unchanged.
pub fn read_be<T: FromBytes>(bytes: &[u8], pos: &mut usize) -> Result<T, BytesError> {
    read_with(bytes, pos, T::from_be_slice)
}

fn read_with<T: FromBytes>(
    bytes: &[u8],
    pos: &mut usize,
    decode: fn(&[u8]) -> Option<T>,
) -> Result<T, BytesError> {
    let raw = take(bytes, *pos, T::SIZE)?;
    let value = decode(raw).ok_or(BytesError::UnexpectedEnd {
        offset: *pos,
        needed: T::SIZE,
        available: raw.len(),
    })?;
    *pos += T::SIZE;
    Ok(value)
}

/// A byte slice with a read offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Cursor at the start of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move to `pos`. Positions past the end are clamped to the end.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.bytes.len());
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    /// Returns `true` when every byte has been read.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The unread part of the slice.
    pub fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos.min(self.bytes.len())..]
    }

    /// Read a little-endian `T`.
    pub fn read_le<T: FromBytes>(&mut self) -> Result<T, BytesError> {
        read_le(self.bytes, &mut self.pos)
    }

    /// Read a big-endian `T`.
    pub fn read_be<T: FromBytes>(&mut self) -> Result<T, BytesError> {
        read_be(self.bytes, &mut self.pos)
    }

    /// Read the next `len` bytes as a sub-slice.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], BytesError> {
        let raw = take(self.bytes, self.pos, len)?;
        self.pos += len;
        Ok(raw)
    }

    /// Skip `len` bytes.
    pub fn skip(&mut self, len: usize) -> Result<(), BytesError> {
        self.read_bytes(len).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_both_byte_orders() {
        let bytes = [0x01, 0x02, 0x03, 0x04];
        let mut pos = 0;
        assert_eq!(read_le::<u16>(&bytes, &mut pos).unwrap(), 0x0201);
        assert_eq!(read_be::<u16>(&bytes, &mut pos).unwrap(), 0x0304);
        assert_eq!(pos, 4);
    }

    #[test]
    fn short_read_leaves_position_alone() {
        let bytes = [0xAA, 0xBB, 0xCC];
        let mut pos = 1;
        let err = read_le::<u32>(&bytes, &mut pos).unwrap_err();
        assert_eq!(
            err,
            BytesError::UnexpectedEnd {
                offset: 1,
                needed: 4,
                available: 2
            }
        );
        assert_eq!(pos, 1);
    }

    #[test]
    fn offset_past_end_is_an_error() {
        let mut pos = 10;
        assert!(read_be::<u8>(&[1, 2], &mut pos).is_err());
        let mut pos = usize::MAX;
        assert!(read_be::<u64>(&[1, 2], &mut pos).is_err());
    }

    #[test]
    fn signed_and_float_values() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(-2i32).to_be_bytes());
        bytes.extend_from_slice(&1.5f64.to_le_bytes());
        let mut cursor = ByteCursor::new(&bytes);
        assert_eq!(cursor.read_be::<i32>().unwrap(), -2);
        assert_eq!(cursor.read_le::<f64>().unwrap(), 1.5);
        assert!(cursor.is_empty());
    }

    #[test]
    fn cursor_slices_and_skips() {
        let bytes = b"\x00\x03abcXYZ";
        let mut cursor = ByteCursor::new(bytes);
        let len: u16 = cursor.read_be().unwrap();
        assert_eq!(cursor.read_bytes(len as usize).unwrap(), b"abc");
        cursor.skip(1).unwrap();
        assert_eq!(cursor.rest(), b"YZ");
        assert_eq!(cursor.remaining(), 2);
        assert!(cursor.skip(3).is_err());
        assert_eq!(cursor.position(), 6);
    }

    #[test]
    fn seek_clamps_to_end() {
        let mut cursor = ByteCursor::new(&[1, 2, 3]);
        cursor.seek(99);
        assert_eq!(cursor.position(), 3);
        assert!(cursor.is_empty());
        cursor.seek(1);
        assert_eq!(cursor.read_le::<u8>().unwrap(), 2);
    }

    #[test]
    fn error_message_names_offset() {
        let mut pos = 0;
        let err = read_le::<u64>(&[0; 3], &mut pos).unwrap_err();
        assert!(err.to_string().contains("offset 0"));
    }
}
