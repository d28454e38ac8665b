//! Append-and-Index
//!
//! Extends the blob file with new records and indexes the appended region,
//! leaving blob and index consistent or the blob untouched:
//!
//! 1. Open the blob for append (creating it if needed).
//! 2. With a new file: remember EOF as the append origin, copy the new
//!    file's bytes in, reposition to the origin. Without one: index the
//!    whole blob from byte 0.
//! 3. Run the line processor from the origin.
//! 4. If the processor fails after an append, truncate the blob back to the
//!    origin. The index may keep entries pointing past the origin; they are
//!    dangling but harmless, failing `pread` with an EOF-class error at
//!    serve time.
//!
//! Appends to the same blob path are mutually exclusive within the process
//! (a lock per canonical path). Cross-process coordination is out of scope.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::{Error, Result};
use crate::extractor::KeyExtractor;
use crate::processor::{LineProcessor, ProcessorConfig};
use crate::store::IndexStore;

static APPEND_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

/// One lock per canonical blob path; appends on different blobs proceed
/// independently.
fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let mut locks = APPEND_LOCKS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap();
    locks.entry(key).or_default().clone()
}

/// Append `new_file` (if any) to the blob at `blob_path` and index the
/// appended region; with no new file, index the whole blob from the start.
///
/// Returns the number of entries written. On a processing error after an
/// append the blob is truncated back to its pre-call size; if that
/// truncation fails too, both failures are reported as
/// [`Error::AppendTruncate`].
pub fn append(
    blob_path: &Path,
    new_file: Option<&Path>,
    extractor: &dyn KeyExtractor,
    sink: &dyn IndexStore,
    batch_size: usize,
    ignore_missing_keys: bool,
) -> Result<u64> {
    let lock = path_lock(blob_path);
    let _guard = lock.lock().unwrap();

    let mut blob = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(blob_path)?;

    let mut initial_offset: i64 = 0;
    if let Some(path) = new_file {
        let origin = blob.seek(SeekFrom::End(0))?;
        initial_offset = origin as i64;

        let mut src = File::open(path)?;
        io::copy(&mut src, &mut blob)?;
        blob.seek(SeekFrom::Start(origin))?;
    }

    let blob_size = blob.metadata()?.len();
    let processor = LineProcessor::new(ProcessorConfig {
        batch_size,
        initial_offset,
        ignore_missing_keys,
        ..ProcessorConfig::default()
    });

    match processor.run_sized(&mut blob, Some(blob_size), extractor, sink) {
        Ok(written) => Ok(written),
        Err(err) => {
            if new_file.is_some() {
                if let Err(terr) = blob.set_len(initial_offset as u64) {
                    return Err(Error::AppendTruncate {
                        append: Box::new(err),
                        truncate: terr,
                    });
                }
                tracing::warn!(
                    blob = %blob_path.display(),
                    origin = initial_offset,
                    "append failed, blob truncated back to origin"
                );
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::FieldExtractor;
    use crate::store::MemoryStore;
    use std::io::Write;

    #[test]
    fn append_serializes_per_path() {
        // Two appends to one blob from two threads may interleave freely,
        // but each runs alone: entry offsets never overlap.
        let dir = tempfile::tempdir().unwrap();
        let blob_path = dir.path().join("data.ldj");

        let mut new_a = tempfile::NamedTempFile::new().unwrap();
        new_a.write_all(b"{\"id\":\"a\"}\n").unwrap();
        let mut new_b = tempfile::NamedTempFile::new().unwrap();
        new_b.write_all(b"{\"id\":\"b\"}\n").unwrap();

        let store = MemoryStore::new();
        std::thread::scope(|scope| {
            for file in [&new_a, &new_b] {
                let blob_path = blob_path.clone();
                let store = &store;
                scope.spawn(move || {
                    append(
                        &blob_path,
                        Some(file.path()),
                        &FieldExtractor::new("id"),
                        store,
                        1000,
                        false,
                    )
                    .unwrap();
                });
            }
        });

        let entries = store.entries();
        assert_eq!(entries.len(), 2);
        let mut offsets: Vec<i64> = entries.iter().map(|(_, o, _)| *o).collect();
        offsets.sort_unstable();
        assert_eq!(offsets, vec![0, 11]);
        assert_eq!(std::fs::metadata(&blob_path).unwrap().len(), 22);
    }
}
