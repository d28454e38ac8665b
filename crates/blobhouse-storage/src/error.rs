//! Storage Error Types
//!
//! Error taxonomy for the storage layer:
//!
//! - `KeyNotFound`: key absent from the index (HTTP 404 at the surface)
//! - `InvalidEntry`: stored index value shorter than 16 bytes or with a
//!   malformed varint half
//! - `Extractor`: a key extractor rejected a record; skipped when
//!   `ignore_missing_keys` is set, fatal otherwise
//! - `Io`: blob or index file I/O failure, including short reads past EOF
//! - `Index`: embedded index engine failure
//! - `AppendTruncate`: an append failed *and* the recovery truncation of the
//!   blob file failed too
//!
//! All storage operations return `Result<T>`, aliased to
//! `Result<T, Error>`, so errors propagate with `?`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("invalid index entry: {0}")]
    InvalidEntry(#[from] blobhouse_core::Error),

    #[error("key extraction failed: {0}")]
    Extractor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index store error: {0}")]
    Index(String),

    #[error("append failed: {append}; truncate recovery failed: {truncate}")]
    AppendTruncate {
        append: Box<Error>,
        truncate: std::io::Error,
    },
}

impl Error {
    /// True for errors a record-level skip can absorb when
    /// `ignore_missing_keys` is set.
    pub fn is_extractor(&self) -> bool {
        matches!(self, Error::Extractor(_))
    }
}
