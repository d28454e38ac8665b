//! Blob File Reader
//!
//! Serves positional reads of `(offset, length)` ranges from the blob file
//! under concurrent HTTP load.
//!
//! On Unix the reader uses `pread(2)` (`FileExt::read_exact_at`): a
//! stateless positional read that never touches a shared file cursor, so
//! concurrent lookups share one descriptor without locking. Elsewhere it
//! falls back to a single handle guarded by a mutex across the seek/read
//! pair; concurrent callers serialize on it.
//!
//! The file opens lazily on first use and opens read-only; appends go
//! through [`crate::appender::append`], never through this type.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(unix)]
use std::sync::{Arc, RwLock};

#[cfg(not(unix))]
use std::io::{Read, Seek, SeekFrom};
#[cfg(not(unix))]
use std::sync::Mutex;

use crate::error::Result;

pub struct BlobFile {
    path: PathBuf,
    #[cfg(unix)]
    file: RwLock<Option<Arc<File>>>,
    #[cfg(not(unix))]
    file: Mutex<Option<File>>,
}

impl BlobFile {
    /// Create a reader over the given blob file path. No I/O happens until
    /// the first read.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            #[cfg(unix)]
            file: RwLock::new(None),
            #[cfg(not(unix))]
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read exactly `length` bytes starting at `offset`.
    ///
    /// `length == 0` returns empty bytes without touching the file. A range
    /// past EOF fails with an `UnexpectedEof` I/O error.
    pub fn pread(&self, offset: i64, length: i64) -> Result<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let offset = u64::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "negative offset"))?;
        let length = usize::try_from(length)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "negative length"))?;

        let mut buf = vec![0u8; length];
        self.read_exact_at(&mut buf, offset)?;
        Ok(buf)
    }

    /// Drop the cached handle. The next read reopens the file.
    pub fn close(&self) {
        #[cfg(unix)]
        {
            self.file.write().unwrap().take();
        }
        #[cfg(not(unix))]
        {
            self.file.lock().unwrap().take();
        }
    }

    #[cfg(unix)]
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let file = self.handle()?;
        file.read_exact_at(buf, offset)?;
        Ok(())
    }

    /// Open the blob file if needed. Safe to call many times; a first-use
    /// race resolves to a single handle.
    #[cfg(unix)]
    fn handle(&self) -> Result<Arc<File>> {
        if let Some(file) = self.file.read().unwrap().as_ref() {
            return Ok(file.clone());
        }

        let mut guard = self.file.write().unwrap();
        if let Some(file) = guard.as_ref() {
            return Ok(file.clone());
        }

        let file = Arc::new(File::open(&self.path)?);
        *guard = Some(file.clone());
        Ok(file)
    }

    #[cfg(not(unix))]
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let mut guard = self.file.lock().unwrap();
        if guard.is_none() {
            *guard = Some(File::open(&self.path)?);
        }
        let file = guard.as_mut().unwrap();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }
}
