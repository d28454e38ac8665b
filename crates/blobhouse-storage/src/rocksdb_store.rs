//! RocksDB-backed index store.
//!
//! Entries are committed through a RocksDB `WriteBatch`, which gives the
//! all-or-nothing batch semantics the pipeline's collector relies on; the
//! engine's WAL makes a committed batch crash-safe. Keys are stored raw, so
//! the engine's ordering is byte order over extracted keys.
//!
//! The database handle opens lazily on the first read or write. First-use
//! races resolve to a single open, and `close` releases the stored handle
//! exactly once.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use rocksdb::{Options, WriteBatch, DB};

use blobhouse_core::Entry;

use crate::error::{Error, Result};
use crate::store::IndexStore;

pub struct RocksDbStore {
    path: PathBuf,
    db: RwLock<Option<Arc<DB>>>,
}

impl RocksDbStore {
    /// Create a store over the given database directory. No I/O happens
    /// until the first operation.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            db: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the database if needed. Safe to call many times.
    fn handle(&self) -> Result<Arc<DB>> {
        if let Some(db) = self.db.read().unwrap().as_ref() {
            return Ok(db.clone());
        }

        let mut guard = self.db.write().unwrap();
        // Lost the open race: another caller got here first.
        if let Some(db) = guard.as_ref() {
            return Ok(db.clone());
        }

        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, &self.path).map_err(|e| {
            Error::Index(format!("failed to open index at {}: {e}", self.path.display()))
        })?;
        let db = Arc::new(db);
        *guard = Some(db.clone());
        Ok(db)
    }
}

impl IndexStore for RocksDbStore {
    fn write_entries(&self, entries: &[Entry]) -> Result<()> {
        let db = self.handle()?;
        let mut batch = WriteBatch::default();
        for entry in entries {
            batch.put(entry.key.as_bytes(), entry.encode_value()?);
        }
        db.write(batch)
            .map_err(|e| Error::Index(format!("batch write failed: {e}")))
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let db = self.handle()?;
        match db.get(key.as_bytes()) {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(Error::KeyNotFound(key.to_string())),
            Err(e) => Err(Error::Index(format!("get failed: {e}"))),
        }
    }

    /// Key count as estimated by the engine. Approximate, which the
    /// optional capability allows; an exact figure would scan every key.
    fn count(&self) -> Result<Option<u64>> {
        let db = self.handle()?;
        db.property_int_value("rocksdb.estimate-num-keys")
            .map_err(|e| Error::Index(format!("count failed: {e}")))
    }

    fn close(&self) -> Result<()> {
        let mut guard = self.db.write().unwrap();
        if let Some(db) = guard.take() {
            drop(db);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobhouse_core::decode_value;

    #[test]
    fn write_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDbStore::new(dir.path().join("index.db"));

        store
            .write_entries(&[Entry::new("a", 0, 18), Entry::new("b", 18, 18)])
            .unwrap();

        let value = store.get("b").unwrap();
        assert_eq!(decode_value(&value).unwrap(), (18, 18));
        assert!(matches!(store.get("nope"), Err(Error::KeyNotFound(_))));

        store.close().unwrap();
        // Close is exactly-once but callable again.
        store.close().unwrap();
    }

    #[test]
    fn reopens_after_close() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDbStore::new(dir.path().join("index.db"));

        store.write_entries(&[Entry::new("k", 7, 3)]).unwrap();
        store.close().unwrap();

        // Lazy open kicks in again on the next call.
        let value = store.get("k").unwrap();
        assert_eq!(decode_value(&value).unwrap(), (7, 3));
        store.close().unwrap();
    }

    #[test]
    fn overwrite_is_last_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDbStore::new(dir.path().join("index.db"));

        store.write_entries(&[Entry::new("dup", 0, 10)]).unwrap();
        store.write_entries(&[Entry::new("dup", 50, 12)]).unwrap();

        let value = store.get("dup").unwrap();
        assert_eq!(decode_value(&value).unwrap(), (50, 12));
        store.close().unwrap();
    }
}
