//! Index Stores
//!
//! The index maps extracted keys to fixed 16-byte values describing where a
//! record lives in the blob file. [`IndexStore`] is the capability set the
//! pipeline and the lookup path need:
//!
//! - `write_entries`: persist a batch atomically (all-or-nothing), last
//!   writer wins per key
//! - `get`: the stored 16-byte value, or [`Error::KeyNotFound`]
//! - `count`: optional; stores without the capability report `None`
//! - `close`: exactly-once release of the handle
//!
//! [`RocksDbStore`](crate::rocksdb_store::RocksDbStore) is the production
//! implementation. [`TsvStore`] echoes entries as tab-separated text for
//! debugging, and [`MemoryStore`] keeps an ordered in-process map, which is
//! what tests want.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Mutex, RwLock};

use blobhouse_core::Entry;

use crate::error::{Error, Result};

/// Ordered key → 16-byte-value store fed by the indexing pipeline.
pub trait IndexStore: Send + Sync {
    /// Persist all entries as one atomic batch. Re-writing a key overwrites.
    fn write_entries(&self, entries: &[Entry]) -> Result<()>;

    /// Fetch the stored value for a key.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Total number of keys, for stores that can tell.
    fn count(&self) -> Result<Option<u64>> {
        Ok(None)
    }

    /// Release the underlying handle. Safe to call more than once.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Debug store that echoes entries as `key\toffset\tlength` lines.
///
/// Lookups always report not-found; the TSV output is the product.
pub struct TsvStore {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl TsvStore {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }
}

impl IndexStore for TsvStore {
    fn write_entries(&self, entries: &[Entry]) -> Result<()> {
        let mut writer = self.writer.lock().unwrap();
        for entry in entries {
            writeln!(writer, "{}\t{}\t{}", entry.key, entry.offset, entry.length)?;
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        Err(Error::KeyNotFound(key.to_string()))
    }
}

/// Ordered in-memory store backed by a `BTreeMap`.
#[derive(Default)]
pub struct MemoryStore {
    map: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded `(offset, length)` pairs in key order, for inspection.
    pub fn entries(&self) -> Vec<(String, i64, i64)> {
        let map = self.map.read().unwrap();
        map.iter()
            .filter_map(|(k, v)| {
                blobhouse_core::decode_value(v)
                    .ok()
                    .map(|(o, l)| (k.clone(), o, l))
            })
            .collect()
    }
}

impl IndexStore for MemoryStore {
    fn write_entries(&self, entries: &[Entry]) -> Result<()> {
        // Encode outside the lock so a bad entry leaves the map untouched.
        let mut encoded = Vec::with_capacity(entries.len());
        for entry in entries {
            encoded.push((entry.key.clone(), entry.encode_value()?.to_vec()));
        }
        let mut map = self.map.write().unwrap();
        for (key, value) in encoded {
            map.insert(key, value);
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let map = self.map.read().unwrap();
        map.get(key)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    fn count(&self) -> Result<Option<u64>> {
        Ok(Some(self.map.read().unwrap().len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsv_store_echoes_entries() {
        let buf: Vec<u8> = Vec::new();
        let sink = std::sync::Arc::new(Mutex::new(buf));

        struct SharedWriter(std::sync::Arc<Mutex<Vec<u8>>>);
        impl Write for SharedWriter {
            fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(data);
                Ok(data.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let store = TsvStore::new(SharedWriter(sink.clone()));
        store
            .write_entries(&[Entry::new("a", 0, 18), Entry::new("b", 18, 20)])
            .unwrap();

        let text = String::from_utf8(sink.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "a\t0\t18\nb\t18\t20\n");
        assert!(matches!(store.get("a"), Err(Error::KeyNotFound(_))));
    }

    #[test]
    fn memory_store_roundtrip_and_overwrite() {
        let store = MemoryStore::new();
        store.write_entries(&[Entry::new("a", 0, 18)]).unwrap();
        store.write_entries(&[Entry::new("a", 36, 18)]).unwrap();

        let value = store.get("a").unwrap();
        assert_eq!(value.len(), blobhouse_core::VALUE_LEN);
        assert_eq!(blobhouse_core::decode_value(&value).unwrap(), (36, 18));
        assert_eq!(store.count().unwrap(), Some(1));
        assert!(matches!(store.get("zz"), Err(Error::KeyNotFound(_))));
    }
}
