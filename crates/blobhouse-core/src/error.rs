//! Error type for core codec operations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// An index value did not have the fixed 16-byte length.
    #[error("invalid index value: want {} bytes, got {0}", crate::VALUE_LEN)]
    InvalidValue(usize),

    /// A varint was truncated or ran past 64 bits.
    #[error("truncated or malformed varint")]
    Varint,

    /// A number's varint form does not fit its fixed 8-byte slot.
    #[error("varint does not fit the fixed 8-byte slot")]
    Overflow,
}
