// SPDX-License-Identifier: MIT OR Apache-2.0
//! Text encodings for redirected streams.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Failure converting between text and bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    /// Bytes are not valid in the encoding.
    #[error("output is not valid {encoding}: {detail}")]
    Decode {
        /// Encoding name.
        encoding: &'static str,
        /// What went wrong.
        detail: String,
    },

    /// Text contains characters the encoding cannot represent.
    #[error("input cannot be encoded as {encoding}: {detail}")]
    Encode {
        /// Encoding name.
        encoding: &'static str,
        /// What went wrong.
        detail: String,
    },

    /// The encoding name is not recognised.
    #[error("unknown encoding '{0}'")]
    Unknown(String),
}

/// Encoding applied to text crossing a process boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextEncoding {
    /// Strict UTF-8; invalid sequences are an error.
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    /// UTF-8 with invalid sequences replaced by U+FFFD.
    #[default]
    #[serde(rename = "utf-8-lossy")]
    Utf8Lossy,
    /// ISO-8859-1: one byte per code point up to U+00FF.
    #[serde(rename = "latin1", alias = "iso-8859-1")]
    Latin1,
    /// UTF-16, little endian, no byte order mark.
    #[serde(rename = "utf-16le")]
    Utf16Le,
}

impl TextEncoding {
    /// Every encoding, in declaration order.
    pub const ALL: [TextEncoding; 4] = [
        TextEncoding::Utf8,
        TextEncoding::Utf8Lossy,
        TextEncoding::Latin1,
        TextEncoding::Utf16Le,
    ];

    /// Canonical name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf8Lossy => "utf-8-lossy",
            TextEncoding::Latin1 => "latin1",
            TextEncoding::Utf16Le => "utf-16le",
        }
    }

    /// Decode captured bytes into text.
    pub fn decode(self, bytes: &[u8]) -> Result<String, EncodingError> {
        let encoding = self.name();
        match self {
            TextEncoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| {
                EncodingError::Decode {
                    encoding,
                    detail: e.utf8_error().to_string(),
                }
            }),
            TextEncoding::Utf8Lossy => Ok(String::from_utf8_lossy(bytes).into_owned()),
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            TextEncoding::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return Err(EncodingError::Decode {
                        encoding,
                        detail: format!("odd byte count {}", bytes.len()),
                    });
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units).map_err(|e| EncodingError::Decode {
                    encoding,
                    detail: e.to_string(),
                })
            }
        }
    }

    /// Decode captured bytes, replacing anything invalid with U+FFFD.
    ///
    /// Used for output attached to a failure, where the exit code and the
    /// partial text matter more than strictness.
    pub fn decode_lossy(self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8Lossy => {
                String::from_utf8_lossy(bytes).into_owned()
            }
            TextEncoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            TextEncoding::Utf16Le => {
                let pairs = bytes.chunks_exact(2);
                let odd = !pairs.remainder().is_empty();
                let units: Vec<u16> = pairs
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                let mut text = String::from_utf16_lossy(&units);
                if odd {
                    text.push(char::REPLACEMENT_CHARACTER);
                }
                text
            }
        }
    }

    /// Encode text for a child's stdin.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, EncodingError> {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8Lossy => Ok(text.as_bytes().to_vec()),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| EncodingError::Encode {
                        encoding: self.name(),
                        detail: format!("character {c:?} is above U+00FF"),
                    })
                })
                .collect(),
            TextEncoding::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextEncoding {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "utf-8-lossy" | "utf8-lossy" => Ok(TextEncoding::Utf8Lossy),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(TextEncoding::Latin1),
            "utf-16le" | "utf16le" => Ok(TextEncoding::Utf16Le),
            _ => Err(EncodingError::Unknown(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for enc in TextEncoding::ALL {
            assert_eq!(enc.name().parse::<TextEncoding>().unwrap(), enc);
        }
        assert!("ebcdic".parse::<TextEncoding>().is_err());
    }

    #[test]
    fn strict_utf8_rejects_invalid_bytes() {
        let err = TextEncoding::Utf8.decode(&[0x66, 0xff]).unwrap_err();
        assert!(matches!(err, EncodingError::Decode { encoding: "utf-8", .. }));
        assert_eq!(TextEncoding::Utf8Lossy.decode(&[0x66, 0xff]).unwrap(), "f\u{fffd}");
        assert_eq!(TextEncoding::Utf8.decode_lossy(&[0x66, 0xff]), "f\u{fffd}");
    }

    #[test]
    fn latin1_maps_bytes_to_code_points() {
        assert_eq!(TextEncoding::Latin1.decode(&[0x63, 0x61, 0x66, 0xe9]).unwrap(), "café");
        assert_eq!(TextEncoding::Latin1.encode("café").unwrap(), vec![0x63, 0x61, 0x66, 0xe9]);
        assert!(TextEncoding::Latin1.encode("€").is_err());
    }

    #[test]
    fn utf16le_decodes_pairs() {
        let bytes = TextEncoding::Utf16Le.encode("hé").unwrap();
        assert_eq!(bytes, vec![0x68, 0x00, 0xe9, 0x00]);
        assert_eq!(TextEncoding::Utf16Le.decode(&bytes).unwrap(), "hé");
        assert!(TextEncoding::Utf16Le.decode(&[0x68]).is_err());
        assert_eq!(TextEncoding::Utf16Le.decode_lossy(&[0x68, 0x00, 0x69]), "h\u{fffd}");
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&TextEncoding::Utf16Le).unwrap();
        assert_eq!(json, "\"utf-16le\"");
        let back: TextEncoding = serde_json::from_str("\"iso-8859-1\"").unwrap();
        assert_eq!(back, TextEncoding::Latin1);
    }
}
