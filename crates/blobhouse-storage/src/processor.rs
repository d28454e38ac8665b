//! Parallel Line-Indexing Pipeline
//!
//! Streams a blob file (or any reader positioned at a known absolute
//! offset), assigns every non-blank line its exact `(offset, length)`, and
//! feeds entry batches to an [`IndexStore`].
//!
//! ## Shape
//!
//! ```text
//! reader (calling thread)      workers (available parallelism)   collector
//! ──────────────────────       ───────────────────────────────   ─────────
//! read lines, assign           extract keys, build entries       serialize
//! offsets, batch      ──work──▶ walking each package     ──upd──▶ write_entries
//!                     channel   in order                 channel
//! ```
//!
//! The reader is the sole assigner of offsets: before a package is handed
//! to a worker it has already reserved the contiguous byte range
//! `[base_offset, base_offset + Σ record lengths)`. Workers walk records in
//! package order, so every entry lands on its exact absolute offset no
//! matter how packages interleave across workers. That makes the resulting
//! mapping deterministic for any worker count.
//!
//! Both channels are bounded: the reader blocks when workers fall behind,
//! workers block when the collector falls behind, and the collector blocks
//! on the store.
//!
//! ## Failure
//!
//! The first error from any stage lands in a shared error slot (release
//! semantics; first error wins). The reader checks the slot each iteration
//! and stops; in-flight packages are drained and discarded; the captured
//! error is the pipeline's return value. Batches the collector committed
//! before the error stay committed.
//!
//! ## Blank lines
//!
//! Whitespace-only lines produce no entries but still occupy file bytes.
//! A blank line ships the pending package early (packages must stay
//! contiguous) and the reader steps over the gap, keeping every later
//! offset exact.

use std::io::{BufRead, BufReader, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;

use blobhouse_core::Entry;

use crate::error::{Error, Result};
use crate::extractor::KeyExtractor;
use crate::store::IndexStore;

/// Records per work package unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Log indexing progress every this many input bytes.
const PROGRESS_STEP: u64 = 512 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Number of records per work package (and per index batch).
    pub batch_size: usize,

    /// Absolute byte offset of the reader's first byte in the blob file.
    pub initial_offset: i64,

    /// Skip records the extractor rejects instead of failing the run.
    pub ignore_missing_keys: bool,

    /// Worker pool size; 0 means available hardware parallelism.
    pub worker_count: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            initial_offset: 0,
            ignore_missing_keys: false,
            worker_count: 0,
        }
    }
}

/// A unit of work handed to a worker: contiguous records starting at
/// `base_offset`.
struct WorkPackage {
    records: Vec<Vec<u8>>,
    base_offset: i64,
}

/// First-error-wins slot shared by every pipeline stage.
#[derive(Default)]
struct ErrorSlot {
    tripped: AtomicBool,
    first: Mutex<Option<Error>>,
}

impl ErrorSlot {
    fn set(&self, err: Error) {
        let mut slot = self.first.lock().unwrap();
        if slot.is_none() {
            *slot = Some(err);
        }
        self.tripped.store(true, Ordering::Release);
    }

    fn is_set(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    fn take(self) -> Option<Error> {
        self.first.into_inner().unwrap()
    }
}

/// Reads lines, extracts keys in a worker pool, and writes entry batches.
pub struct LineProcessor {
    config: ProcessorConfig,
}

impl LineProcessor {
    pub fn new(config: ProcessorConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline over `input`. Returns the number of entries written.
    pub fn run<R: Read>(
        &self,
        input: R,
        extractor: &dyn KeyExtractor,
        sink: &dyn IndexStore,
    ) -> Result<u64> {
        self.run_sized(input, None, extractor, sink)
    }

    /// Like [`run`](Self::run), with a known input size for progress logging.
    pub fn run_sized<R: Read>(
        &self,
        input: R,
        input_size: Option<u64>,
        extractor: &dyn KeyExtractor,
        sink: &dyn IndexStore,
    ) -> Result<u64> {
        let batch_size = self.config.batch_size.max(1);
        let worker_count = match self.config.worker_count {
            0 => thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            n => n,
        };

        let (work_tx, work_rx) = sync_channel::<WorkPackage>(worker_count);
        let (update_tx, update_rx) = sync_channel::<Vec<Entry>>(worker_count);
        let work_rx = Arc::new(Mutex::new(work_rx));

        let errors = ErrorSlot::default();
        let written = AtomicU64::new(0);
        let ignore_missing_keys = self.config.ignore_missing_keys;

        thread::scope(|scope| {
            for _ in 0..worker_count {
                let work_rx = Arc::clone(&work_rx);
                let update_tx = update_tx.clone();
                let errors = &errors;
                scope.spawn(move || {
                    worker(&work_rx, update_tx, extractor, errors, ignore_missing_keys)
                });
            }
            // Workers hold the only remaining update senders, so the
            // collector sees end-of-stream once they exit.
            drop(update_tx);

            {
                let errors = &errors;
                let written = &written;
                scope.spawn(move || collector(update_rx, sink, errors, written));
            }

            self.read_loop(input, input_size, batch_size, work_tx, &errors);
        });

        match errors.take() {
            Some(err) => Err(err),
            None => Ok(written.into_inner()),
        }
    }

    /// Single-threaded offset assignment: reads lines, accumulates packages,
    /// ships them down the bounded work channel.
    fn read_loop<R: Read>(
        &self,
        input: R,
        input_size: Option<u64>,
        batch_size: usize,
        work_tx: SyncSender<WorkPackage>,
        errors: &ErrorSlot,
    ) {
        let mut reader = BufReader::new(input);
        let mut next_offset = self.config.initial_offset;
        let mut pending: Vec<Vec<u8>> = Vec::new();
        let mut pending_bytes: i64 = 0;
        let mut line: Vec<u8> = Vec::new();
        let mut read_total: u64 = 0;
        let mut last_logged: u64 = 0;

        loop {
            if errors.is_set() {
                tracing::warn!("stopping reader early after pipeline error");
                return;
            }

            line.clear();
            let n = match reader.read_until(b'\n', &mut line) {
                Ok(0) => break, // EOF; a final line without LF arrives as n > 0
                Ok(n) => n,
                Err(err) => {
                    errors.set(err.into());
                    return;
                }
            };

            read_total += n as u64;
            if let Some(total) = input_size {
                if read_total - last_logged >= PROGRESS_STEP {
                    last_logged = read_total;
                    tracing::info!(
                        bytes_read = read_total,
                        total_bytes = total,
                        "indexing progress"
                    );
                }
            }

            if line.iter().all(|b| b.is_ascii_whitespace()) {
                // No entry, but the bytes still sit in the file. Ship the
                // pending package so packages stay contiguous, then step
                // over the gap.
                if !ship(&work_tx, &mut pending, &mut pending_bytes, &mut next_offset) {
                    return;
                }
                next_offset += n as i64;
                continue;
            }

            pending.push(std::mem::take(&mut line));
            pending_bytes += n as i64;

            if pending.len() >= batch_size
                && !ship(&work_tx, &mut pending, &mut pending_bytes, &mut next_offset)
            {
                return;
            }
        }

        ship(&work_tx, &mut pending, &mut pending_bytes, &mut next_offset);
    }
}

/// Ship the pending records as one package and advance `next_offset` past
/// them. Empty batches ship nothing. Returns false when the pipeline is
/// gone.
fn ship(
    work_tx: &SyncSender<WorkPackage>,
    pending: &mut Vec<Vec<u8>>,
    pending_bytes: &mut i64,
    next_offset: &mut i64,
) -> bool {
    if pending.is_empty() {
        return true;
    }
    let pkg = WorkPackage {
        records: std::mem::take(pending),
        base_offset: *next_offset,
    };
    *next_offset += *pending_bytes;
    *pending_bytes = 0;
    work_tx.send(pkg).is_ok()
}

/// Walks each package in record order, running the extractor and emitting
/// entries with exact absolute offsets.
fn worker(
    work_rx: &Mutex<Receiver<WorkPackage>>,
    update_tx: SyncSender<Vec<Entry>>,
    extractor: &dyn KeyExtractor,
    errors: &ErrorSlot,
    ignore_missing_keys: bool,
) {
    loop {
        let pkg = match work_rx.lock().unwrap().recv() {
            Ok(pkg) => pkg,
            Err(_) => return, // work channel closed and drained
        };
        if errors.is_set() {
            continue; // drain and discard in-flight work
        }

        let mut offset = pkg.base_offset;
        let mut entries = Vec::with_capacity(pkg.records.len());
        for record in &pkg.records {
            let length = record.len() as i64;
            match extractor.extract_key(record) {
                Ok(key) => entries.push(Entry::new(key, offset, length)),
                Err(err) if ignore_missing_keys && err.is_extractor() => {
                    // Dropped record; its bytes still advance the running
                    // offset below so later entries stay exact.
                    tracing::debug!(offset, "ignoring record without key: {err}");
                }
                Err(err) => {
                    errors.set(err);
                    break;
                }
            }
            offset += length;
        }

        // Entries built before a mid-package failure are still handed over;
        // whether they commit depends on how far the collector got.
        if !entries.is_empty() && update_tx.send(entries).is_err() {
            return;
        }
    }
}

/// Serializes entry batches into the store, one batch at a time.
fn collector(
    update_rx: Receiver<Vec<Entry>>,
    sink: &dyn IndexStore,
    errors: &ErrorSlot,
    written: &AtomicU64,
) {
    while let Ok(batch) = update_rx.recv() {
        if errors.is_set() {
            continue; // keep draining so workers never block on a dead run
        }
        match sink.write_entries(&batch) {
            Ok(()) => {
                written.fetch_add(batch.len() as u64, Ordering::Relaxed);
            }
            Err(err) => {
                tracing::warn!("could not write batch: {err}");
                errors.set(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::FieldExtractor;
    use crate::store::MemoryStore;

    #[test]
    fn assigns_offsets_from_initial_offset() {
        let input = b"{\"id\":\"x\"}\n{\"id\":\"y\"}\n";
        let store = MemoryStore::new();
        let processor = LineProcessor::new(ProcessorConfig {
            initial_offset: 1000,
            ..Default::default()
        });

        let written = processor
            .run(&input[..], &FieldExtractor::new("id"), &store)
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(
            store.entries(),
            vec![("x".into(), 1000, 11), ("y".into(), 1011, 11)]
        );
    }

    #[test]
    fn empty_input_writes_nothing() {
        let store = MemoryStore::new();
        let processor = LineProcessor::new(ProcessorConfig::default());
        let written = processor
            .run(&b""[..], &FieldExtractor::new("id"), &store)
            .unwrap();
        assert_eq!(written, 0);
        assert!(store.entries().is_empty());
    }

    #[test]
    fn batch_size_zero_behaves_like_one() {
        let input = b"{\"id\":\"x\"}\n{\"id\":\"y\"}\n";
        let store = MemoryStore::new();
        let processor = LineProcessor::new(ProcessorConfig {
            batch_size: 0,
            ..Default::default()
        });
        let written = processor
            .run(&input[..], &FieldExtractor::new("id"), &store)
            .unwrap();
        assert_eq!(written, 2);
    }
}
