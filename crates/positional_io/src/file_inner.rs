// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shared implementation behind [`PositionalFile`](crate::PositionalFile).
//!
//! All operations here take *resolved* absolute offsets; end-relative offset
//! handling lives at the public API boundary. Every blocking syscall runs on
//! the dispatcher's worker pool, and any [`ByteBuf`] involved in a transfer
//! is pinned by its guard inside the worker closure, so the guard is released
//! on every exit path no matter how the calling future is treated.

use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard};
#[cfg(windows)]
use std::sync::RwLockWriteGuard;

use tracing::{Level, event};

use crate::accumulator;
use crate::byte_buf::ByteBuf;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};

#[derive(Debug)]
pub(crate) struct FileInner {
    file: Arc<RwLock<File>>,
    path: Option<Arc<PathBuf>>,
    readable: bool,
    writable: bool,
    dispatcher: Dispatcher,
}

impl FileInner {
    pub fn new(file: File, path: Option<PathBuf>, readable: bool, writable: bool) -> Self {
        Self {
            file: Arc::new(RwLock::new(file)),
            path: path.map(Arc::new),
            readable,
            writable,
            dispatcher: Dispatcher::global(),
        }
    }

    pub fn check_readable(&self) -> Result<()> {
        if self.readable { Ok(()) } else { Err(Error::ClosedForReading) }
    }

    pub fn check_writable(&self) -> Result<()> {
        if self.writable { Ok(()) } else { Err(Error::ClosedForWriting) }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_deref()
    }

    /// Queries the file size without touching the stream cursor.
    pub async fn size(&self) -> Result<u64> {
        let file = Arc::clone(&self.file);
        let path = self.path.clone();
        self.dispatcher
            .dispatch(move || {
                let f = read_lock(&file)?;
                f.metadata().map(|m| m.len()).map_err(|e| Error::io(e, path.as_ref()))
            })
            .await
    }

    /// One bounded positional read into a fresh allocation.
    ///
    /// Returns the bytes actually read, which may be fewer than `len` even
    /// before end-of-file, per raw syscall semantics. An empty result means
    /// end-of-file.
    pub async fn bounded_read(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        event!(Level::TRACE, offset, len, "file positional read");
        let file = Arc::clone(&self.file);
        let path = self.path.clone();
        self.dispatcher
            .dispatch(move || {
                let f = positional_lock(&file)?;
                let mut buf = vec![0u8; len];
                let n = positional_read(&f, buf.as_mut_slice(), offset).map_err(|e| Error::io(e, path.as_ref()))?;
                buf.truncate(n);
                Ok(buf)
            })
            .await
    }

    /// One bounded positional read into a caller-supplied buffer.
    ///
    /// The buffer is pinned for the syscall's duration. It holds exactly the
    /// bytes read on success and is left empty on end-of-file or failure.
    pub async fn bounded_read_into(&self, offset: u64, len: usize, buf: ByteBuf) -> Result<usize> {
        event!(Level::TRACE, offset, len, "file positional read into caller buffer");
        let file = Arc::clone(&self.file);
        let path = self.path.clone();
        self.dispatcher
            .dispatch(move || {
                let f = positional_lock(&file)?;
                let mut guard = buf.write_guard()?;
                guard.resize(len, 0);
                match positional_read(&f, guard.as_mut_slice(), offset) {
                    Ok(n) => {
                        guard.truncate(n);
                        Ok(n)
                    }
                    Err(e) => {
                        guard.clear();
                        Err(Error::io(e, path.as_ref()))
                    }
                }
            })
            .await
    }

    /// Reads from `offset` to end-of-file in [`accumulator::CHUNK_SIZE`] steps.
    pub async fn read_to_end(&self, offset: u64) -> Result<Vec<u8>> {
        event!(Level::TRACE, offset, "file unbounded read");
        let file = Arc::clone(&self.file);
        let path = self.path.clone();
        self.dispatcher
            .dispatch(move || {
                let f = positional_lock(&file)?;
                accumulator::read_to_end(offset, accumulator::CHUNK_SIZE, |chunk_offset, chunk| {
                    positional_read(&f, chunk, chunk_offset).map_err(|e| Error::io(e, path.as_ref()))
                })
            })
            .await
    }

    /// Unbounded read into a caller-supplied buffer; all-or-nothing.
    ///
    /// The buffer is pinned across the whole chunk loop and receives the
    /// accumulation only once it is complete, so a failed read never leaves
    /// partial content behind.
    pub async fn read_to_end_into(&self, offset: u64, buf: ByteBuf) -> Result<usize> {
        let file = Arc::clone(&self.file);
        let path = self.path.clone();
        self.dispatcher
            .dispatch(move || {
                let f = positional_lock(&file)?;
                let mut guard = buf.write_guard()?;
                let outcome = accumulator::read_to_end(offset, accumulator::CHUNK_SIZE, |chunk_offset, chunk| {
                    positional_read(&f, chunk, chunk_offset).map_err(|e| Error::io(e, path.as_ref()))
                });
                match outcome {
                    Ok(collected) => {
                        let n = collected.len();
                        *guard = collected;
                        Ok(n)
                    }
                    Err(e) => {
                        guard.clear();
                        Err(e)
                    }
                }
            })
            .await
    }

    /// One positional write from a borrowed slice.
    pub async fn write_at(&self, offset: u64, data: &[u8]) -> Result<usize> {
        event!(Level::TRACE, offset, len = data.len(), "file positional write");
        let file = Arc::clone(&self.file);
        let path = self.path.clone();
        let raw = SendSlice::new(data);
        self.dispatcher
            .dispatch_scoped(move || {
                // SAFETY: ScopedDispatchFuture guarantees the closure completes
                // (or never starts) before the caller regains access to `data`.
                let data = unsafe { raw.into_slice() };
                let f = positional_lock(&file)?;
                write_once(&f, data, offset, path.as_ref())
            })
            .await
    }

    /// One positional write sourced from a shared buffer.
    ///
    /// The source buffer is pinned for the syscall's duration.
    pub async fn write_buf_at(&self, offset: u64, data: ByteBuf) -> Result<usize> {
        let file = Arc::clone(&self.file);
        let path = self.path.clone();
        self.dispatcher
            .dispatch(move || {
                let f = positional_lock(&file)?;
                let guard = data.read_guard()?;
                write_once(&f, &guard, offset, path.as_ref())
            })
            .await
    }
}

/// Issues a single positional write and applies the short-write policy.
fn write_once(file: &File, data: &[u8], offset: u64, path: Option<&Arc<PathBuf>>) -> Result<usize> {
    let n = positional_write(file, data, offset).map_err(|e| Error::io(e, path))?;
    enforce_full_write(n, data.len())
}

/// The OS accepting fewer bytes than requested is an error, never a silent
/// partial success; the count that did land is reported for recovery.
fn enforce_full_write(written: usize, requested: usize) -> Result<usize> {
    if written < requested {
        return Err(Error::ShortWrite { written, requested });
    }
    Ok(written)
}

fn read_lock(file: &RwLock<File>) -> Result<RwLockReadGuard<'_, File>> {
    file.read().map_err(Error::poisoned)
}

#[cfg(windows)]
fn write_lock(file: &RwLock<File>) -> Result<RwLockWriteGuard<'_, File>> {
    file.write().map_err(Error::poisoned)
}

/// Lock for positional I/O operations.
///
/// On Unix, `pread`/`pwrite` are truly cursor-independent, so a shared lock
/// suffices and allows concurrent positional operations.
///
/// On Windows, `seek_read`/`seek_write` move the file cursor as a side effect
/// (a documented platform deviation), so an exclusive lock is required to
/// prevent concurrent positional operations from corrupting each other's
/// seek position.
#[cfg(unix)]
fn positional_lock(file: &RwLock<File>) -> Result<RwLockReadGuard<'_, File>> {
    read_lock(file)
}

#[cfg(windows)]
fn positional_lock(file: &RwLock<File>) -> Result<RwLockWriteGuard<'_, File>> {
    write_lock(file)
}

/// Reads bytes at `offset` without affecting the cursor.
#[cfg(unix)]
fn positional_read(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

/// Reads bytes at `offset`; moves the cursor on Windows.
#[cfg(windows)]
fn positional_read(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

/// Writes bytes at `offset` without affecting the cursor.
#[cfg(unix)]
fn positional_write(file: &File, buf: &[u8], offset: u64) -> std::io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.write_at(buf, offset)
}

/// Writes bytes at `offset`; moves the cursor on Windows.
#[cfg(windows)]
fn positional_write(file: &File, buf: &[u8], offset: u64) -> std::io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_write(buf, offset)
}

/// An immutable raw-pointer slice that is [`Send`].
///
/// # Safety
///
/// The caller must guarantee the pointed-to data is alive and not mutably
/// aliased for the duration of any cross-thread access. In this crate,
/// [`ScopedDispatchFuture`](crate::dispatcher::ScopedDispatchFuture) provides
/// that guarantee by blocking on drop.
#[derive(Clone, Copy)]
struct SendSlice {
    ptr: *const u8,
    len: usize,
}

impl SendSlice {
    fn new(slice: &[u8]) -> Self {
        Self {
            ptr: slice.as_ptr(),
            len: slice.len(),
        }
    }

    /// Reconstructs the original `&[u8]`.
    ///
    /// # Safety
    ///
    /// The original slice must still be alive and not mutably aliased.
    unsafe fn into_slice(self) -> &'static [u8] {
        // SAFETY: caller guarantees the slice is alive and unaliased.
        unsafe { core::slice::from_raw_parts(self.ptr, self.len) }
    }
}

// SAFETY: The safety contract on SendSlice::new and ScopedDispatchFuture
// together ensure the data is alive and unaliased during cross-thread access.
unsafe impl Send for SendSlice {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_write_counts_become_errors() {
        assert!(matches!(
            enforce_full_write(3, 8),
            Err(Error::ShortWrite { written: 3, requested: 8 })
        ));
        assert!(matches!(
            enforce_full_write(0, 1),
            Err(Error::ShortWrite { written: 0, requested: 1 })
        ));
    }

    #[test]
    fn full_write_counts_pass_through() {
        assert!(matches!(enforce_full_write(8, 8), Ok(8)));
        assert!(matches!(enforce_full_write(0, 0), Ok(0)));
    }
}
