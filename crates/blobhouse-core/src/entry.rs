//! Index Entries
//!
//! An [`Entry`] associates a string key with one record in the blob file,
//! identified by byte offset and byte length. Entries are produced by the
//! indexing pipeline and persisted in the index store as a fixed 16-byte
//! value:
//!
//! ```text
//! bytes  0..8   varint-encoded signed offset  (zig-zag, zero padded)
//! bytes  8..16  varint-encoded signed length  (zig-zag, zero padded)
//! ```
//!
//! The layout trades a few padding bytes for a bounded, stable value size.
//! Readers consume only the varint prefix of each half; a stored value
//! shorter than 16 bytes is corrupt.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::varint::{decode_varint, encode_varint};

/// Fixed byte length of every value stored in the index.
pub const VALUE_LEN: usize = 16;

/// Associates a key with a section of the blob file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Extracted record key.
    #[serde(rename = "k")]
    pub key: String,

    /// Absolute byte offset of the record in the blob file.
    #[serde(rename = "o")]
    pub offset: i64,

    /// Record length in bytes, trailing newline included.
    #[serde(rename = "l")]
    pub length: i64,
}

impl Entry {
    pub fn new(key: impl Into<String>, offset: i64, length: i64) -> Self {
        Self {
            key: key.into(),
            offset,
            length,
        }
    }

    /// Encode offset and length into the fixed 16-byte index value.
    ///
    /// Fails with [`Error::Overflow`] if either varint exceeds its 8-byte
    /// slot, which needs a magnitude of 2^55 or more.
    pub fn encode_value(&self) -> Result<[u8; VALUE_LEN]> {
        let mut value = [0u8; VALUE_LEN];
        put_half(&mut value[..8], self.offset)?;
        put_half(&mut value[8..], self.length)?;
        Ok(value)
    }
}

fn put_half(slot: &mut [u8], number: i64) -> Result<()> {
    let mut buf = Vec::with_capacity(10);
    encode_varint(&mut buf, number);
    if buf.len() > slot.len() {
        return Err(Error::Overflow);
    }
    slot[..buf.len()].copy_from_slice(&buf);
    Ok(())
}

/// Decode `(offset, length)` from a stored index value.
///
/// Fails with [`Error::InvalidValue`] when the value is shorter than
/// [`VALUE_LEN`] and with [`Error::Varint`] when either half is malformed.
pub fn decode_value(value: &[u8]) -> Result<(i64, i64)> {
    if value.len() < VALUE_LEN {
        return Err(Error::InvalidValue(value.len()));
    }
    let offset = decode_varint(&mut &value[..8])?;
    let length = decode_varint(&mut &value[8..VALUE_LEN])?;
    Ok((offset, length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_roundtrip() {
        let entry = Entry::new("a", 0, 18);
        let value = entry.encode_value().unwrap();
        assert_eq!(value.len(), VALUE_LEN);
        assert_eq!(decode_value(&value).unwrap(), (0, 18));

        let entry = Entry::new("far", 123_456_789_012, 9_876_543);
        let value = entry.encode_value().unwrap();
        assert_eq!(decode_value(&value).unwrap(), (123_456_789_012, 9_876_543));
    }

    #[test]
    fn test_value_layout_is_varint_prefixed_halves() {
        let value = Entry::new("b", 18, 18).encode_value().unwrap();
        // 18 zig-zags to 36, a single byte; the rest of each half is padding.
        assert_eq!(value[0], 36);
        assert_eq!(&value[1..8], &[0u8; 7]);
        assert_eq!(value[8], 36);
        assert_eq!(&value[9..16], &[0u8; 7]);
    }

    #[test]
    fn test_short_value_is_invalid() {
        assert_eq!(decode_value(&[0u8; 15]), Err(Error::InvalidValue(15)));
        assert_eq!(decode_value(&[]), Err(Error::InvalidValue(0)));
    }

    #[test]
    fn test_oversized_offset_does_not_fit() {
        // 2^55 zig-zags past the 56 data bits an 8-byte varint can carry.
        let entry = Entry::new("huge", 1i64 << 55, 1);
        assert_eq!(entry.encode_value(), Err(Error::Overflow));
    }

    #[test]
    fn test_longer_value_decodes_prefix() {
        // Values longer than 16 bytes are tolerated; only the prefix counts.
        let mut value = Entry::new("c", 36, 18).encode_value().unwrap().to_vec();
        value.push(0xFF);
        assert_eq!(decode_value(&value).unwrap(), (36, 18));
    }
}
