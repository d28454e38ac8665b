//! Append-and-index tests: offset continuity across appends, truncation
//! recovery, and the initial full build.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use blobhouse_storage::{
    append, BlobFile, Error, FieldExtractor, LookupService, MemoryStore,
};

fn write_file(path: &Path, content: &[u8]) {
    std::fs::File::create(path)
        .unwrap()
        .write_all(content)
        .unwrap();
}

fn named_temp(content: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content).unwrap();
    file
}

#[test]
fn initial_build_indexes_whole_blob() {
    let dir = tempfile::tempdir().unwrap();
    let blob_path = dir.path().join("data.ldj");
    write_file(
        &blob_path,
        b"{\"id\":\"a\",\"v\":11}\n{\"id\":\"b\",\"v\":22}\n{\"id\":\"c\",\"v\":33}\n",
    );

    let store = MemoryStore::new();
    let written = append(
        &blob_path,
        None,
        &FieldExtractor::new("id"),
        &store,
        50_000,
        false,
    )
    .unwrap();

    assert_eq!(written, 3);
    assert_eq!(
        store.entries(),
        vec![
            ("a".into(), 0, 18),
            ("b".into(), 18, 18),
            ("c".into(), 36, 18),
        ]
    );
}

#[test]
fn empty_blob_yields_empty_index() {
    let dir = tempfile::tempdir().unwrap();
    let blob_path = dir.path().join("data.ldj");
    write_file(&blob_path, b"");

    let store = MemoryStore::new();
    let written = append(
        &blob_path,
        None,
        &FieldExtractor::new("id"),
        &store,
        50_000,
        false,
    )
    .unwrap();

    assert_eq!(written, 0);
    assert!(store.entries().is_empty());
}

#[test]
fn append_continues_offsets_at_old_eof() {
    let dir = tempfile::tempdir().unwrap();
    let blob_path = dir.path().join("data.ldj");
    // Three 18-byte lines: 54 bytes.
    write_file(
        &blob_path,
        b"{\"id\":\"a\",\"v\":11}\n{\"id\":\"b\",\"v\":22}\n{\"id\":\"c\",\"v\":33}\n",
    );

    let store = Arc::new(MemoryStore::new());
    append(
        &blob_path,
        None,
        &FieldExtractor::new("id"),
        store.as_ref(),
        50_000,
        false,
    )
    .unwrap();

    // Two more 18-byte lines arrive.
    let new = named_temp(b"{\"id\":\"d\",\"v\":44}\n{\"id\":\"e\",\"v\":55}\n");
    let written = append(
        &blob_path,
        Some(new.path()),
        &FieldExtractor::new("id"),
        store.as_ref(),
        50_000,
        false,
    )
    .unwrap();

    assert_eq!(written, 2);
    assert_eq!(std::fs::metadata(&blob_path).unwrap().len(), 90);

    let entries = store.entries();
    assert_eq!(entries.len(), 5);
    assert!(entries.contains(&("d".into(), 54, 18)));
    assert!(entries.contains(&("e".into(), 72, 18)));

    // The appended records are servable.
    let lookup = LookupService::new(store.clone(), Arc::new(BlobFile::new(&blob_path)));
    assert_eq!(lookup.get("e").unwrap(), b"{\"id\":\"e\",\"v\":55}\n");
}

#[test]
fn failed_append_truncates_blob_to_previous_size() {
    let dir = tempfile::tempdir().unwrap();
    let blob_path = dir.path().join("data.ldj");
    write_file(&blob_path, b"{\"id\":\"a\"}\n");
    let size_before = std::fs::metadata(&blob_path).unwrap().len();

    // The new data is not JSON, so the field extractor fails the run.
    let new = named_temp(b"plain noise\nmore noise\n");
    let store = MemoryStore::new();
    let err = append(
        &blob_path,
        Some(new.path()),
        &FieldExtractor::new("id"),
        &store,
        50_000,
        false,
    )
    .unwrap_err();

    assert!(matches!(err, Error::Extractor(_)));
    assert_eq!(std::fs::metadata(&blob_path).unwrap().len(), size_before);
}

#[test]
fn failed_initial_build_does_not_truncate() {
    let dir = tempfile::tempdir().unwrap();
    let blob_path = dir.path().join("data.ldj");
    write_file(&blob_path, b"plain noise\n");

    let store = MemoryStore::new();
    let err = append(
        &blob_path,
        None,
        &FieldExtractor::new("id"),
        &store,
        50_000,
        false,
    )
    .unwrap_err();

    assert!(matches!(err, Error::Extractor(_)));
    // No new file was appended, so nothing gets truncated.
    assert_eq!(std::fs::metadata(&blob_path).unwrap().len(), 12);
}

#[test]
fn append_with_ignored_bad_record_keeps_later_offsets_exact() {
    let dir = tempfile::tempdir().unwrap();
    let blob_path = dir.path().join("data.ldj");
    write_file(&blob_path, b"{\"id\":\"a\",\"v\":11}\n"); // 18 bytes

    // 8-byte bad record in the middle of the new region.
    let new = named_temp(b"{\"id\":\"d\"}\n{\"x\":1}\n{\"id\":\"e\"}\n");
    let store = MemoryStore::new();
    let written = append(
        &blob_path,
        Some(new.path()),
        &FieldExtractor::new("id"),
        &store,
        50_000,
        true,
    )
    .unwrap();

    assert_eq!(written, 2);
    assert_eq!(std::fs::metadata(&blob_path).unwrap().len(), 18 + 30);

    let entries = store.entries();
    // d at old EOF; e's offset accounts for the skipped 8-byte record.
    assert!(entries.contains(&("d".into(), 18, 11)));
    assert!(entries.contains(&("e".into(), 37, 11)));
}

#[test]
fn creates_blob_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let blob_path = dir.path().join("fresh.ldj");

    let new = named_temp(b"{\"id\":\"only\"}\n");
    let store = MemoryStore::new();
    let written = append(
        &blob_path,
        Some(new.path()),
        &FieldExtractor::new("id"),
        &store,
        50_000,
        false,
    )
    .unwrap();

    assert_eq!(written, 1);
    assert_eq!(store.entries(), vec![("only".into(), 0, 14)]);
}
