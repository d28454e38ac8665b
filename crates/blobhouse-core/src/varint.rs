//! Variable-length Integer Encoding (Varint)
//!
//! Index values store offsets and lengths as varints so small numbers use
//! only as many bytes as needed:
//! - Small numbers (0-127) use just 1 byte
//! - Larger numbers use 2-10 bytes depending on magnitude
//! - Each byte uses 7 bits for data and 1 bit as a "continuation" flag
//!
//! ## ZigZag Encoding (for signed integers)
//! Maps signed integers to unsigned so small negative numbers are also
//! efficient:
//! - 0 → 0, -1 → 1, 1 → 2, -2 → 3, 2 → 4, etc.
//!
//! Offsets and lengths are non-negative in practice, but the on-disk value
//! format is signed, so the codec is signed end to end.
//!
//! ## Why This Matters for blobhouse
//! Every key in the index carries a fixed 16-byte value whose two 8-byte
//! halves each hold one varint (offset, then length). The varint rarely
//! needs all 8 bytes; readers must only consume the varint prefix of each
//! half and ignore the zero padding behind it.
//!
//! Unlike a wire protocol, a corrupt index value must surface as an error
//! rather than a panic, so the decoders are fallible.

use bytes::{Buf, BufMut};

use crate::error::{Error, Result};

/// Encode a signed integer as a varint (ZigZag encoding).
pub fn encode_varint(buf: &mut impl BufMut, value: i64) {
    // ZigZag encoding: maps signed integers to unsigned
    // 0 => 0, -1 => 1, 1 => 2, -2 => 3, 2 => 4, etc.
    let unsigned = ((value << 1) ^ (value >> 63)) as u64;

    encode_varint_u64(buf, unsigned);
}

/// Encode an unsigned integer as a varint.
pub fn encode_varint_u64(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;

        if value != 0 {
            byte |= 0x80; // Set continuation bit
        }

        buf.put_u8(byte);

        if value == 0 {
            break;
        }
    }
}

/// Decode a varint to a signed integer.
pub fn decode_varint(buf: &mut impl Buf) -> Result<i64> {
    let unsigned = decode_varint_u64(buf)?;

    // ZigZag decoding
    let value = (unsigned >> 1) as i64;
    if (unsigned & 1) != 0 {
        Ok(!value)
    } else {
        Ok(value)
    }
}

/// Decode a varint to an unsigned integer.
///
/// Fails on a truncated buffer and on a varint running past 64 bits.
pub fn decode_varint_u64(buf: &mut impl Buf) -> Result<u64> {
    let mut value: u64 = 0;
    let mut shift = 0;

    loop {
        if !buf.has_remaining() {
            return Err(Error::Varint);
        }
        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            break;
        }

        shift += 7;

        if shift >= 64 {
            return Err(Error::Varint);
        }
    }

    Ok(value)
}
