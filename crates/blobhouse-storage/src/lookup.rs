//! Key → record lookup, composing the index store and the blob reader.

use std::sync::Arc;

use blobhouse_core::decode_value;

use crate::blob::BlobFile;
use crate::error::Result;
use crate::store::IndexStore;

/// Answers `get(key) → bytes` against one blob file and its index.
pub struct LookupService {
    store: Arc<dyn IndexStore>,
    blob: Arc<BlobFile>,
}

impl LookupService {
    pub fn new(store: Arc<dyn IndexStore>, blob: Arc<BlobFile>) -> Self {
        Self { store, blob }
    }

    /// Fetch the record stored under `key`.
    ///
    /// Fails with *not-found* for an absent key, *invalid-entry* for a
    /// stored value shorter than 16 bytes or with a malformed varint half,
    /// and an I/O error when the decoded range runs past the blob file.
    pub fn get(&self, key: &str) -> Result<Vec<u8>> {
        let value = self.store.get(key)?;
        let (offset, length) = decode_value(&value)?;
        self.blob.pread(offset, length)
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    pub fn blob(&self) -> &Arc<BlobFile> {
        &self.blob
    }

    /// Release both handles. Safe to call more than once.
    pub fn close(&self) -> Result<()> {
        self.blob.close();
        self.store.close()
    }
}
