//! blobhouse storage layer
//!
//! Everything between raw blob-file bytes and the HTTP surface:
//!
//! 1. **Key extraction** ([`extractor`]): regex, JSON field, and sole
//!    top-level-key extractors behind one trait.
//! 2. **Index stores** ([`store`], [`rocksdb_store`]): ordered key →
//!    16-byte-value stores with atomic batch writes.
//! 3. **Blob reads** ([`blob`]): lock-free positional reads of record
//!    ranges, safe under concurrent lookups.
//! 4. **Indexing pipeline** ([`processor`]): the parallel reader/worker/
//!    collector pipeline that turns lines into entries with exact offsets.
//! 5. **Append** ([`appender`]): extend blob and index together, with
//!    truncation recovery when indexing fails.
//! 6. **Lookup** ([`lookup`]): `key → record bytes`, composing store and
//!    blob reader.

pub mod appender;
pub mod blob;
pub mod error;
pub mod extractor;
pub mod lookup;
pub mod processor;
pub mod rocksdb_store;
pub mod store;

pub use appender::append;
pub use blob::BlobFile;
pub use error::{Error, Result};
pub use extractor::{FieldExtractor, KeyExtractor, RegexExtractor, ToplevelExtractor};
pub use lookup::LookupService;
pub use processor::{LineProcessor, ProcessorConfig, DEFAULT_BATCH_SIZE};
pub use rocksdb_store::RocksDbStore;
pub use store::{IndexStore, MemoryStore, TsvStore};
