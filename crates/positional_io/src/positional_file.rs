// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::byte_buf::ByteBuf;
use crate::error::Result;
use crate::file_inner::FileInner;
use crate::offset;
use crate::open_options::OpenOptions;

/// A file handle for reads and writes at explicit byte offsets.
///
/// Every operation names the position it acts on, so concurrent operations on
/// the same handle never race over a shared cursor. On Unix the stream cursor
/// is never touched at all; on Windows the underlying platform calls move it,
/// so mixing positional and cursor-based I/O there is not supported.
///
/// Offsets are signed: a negative offset counts back from the current
/// end-of-file, so `-4` names the fourth byte from the end. Resolution
/// happens once, at the start of each operation.
///
/// Cloning is cheap and clones share the same open file.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> positional_io::Result<()> {
/// let file = positional_io::PositionalFile::open("data.bin").await?;
/// if let Some(tail) = file.read_at(-4, 4).await? {
///     println!("last four bytes: {tail:?}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PositionalFile {
    inner: Arc<FileInner>,
}

impl PositionalFile {
    /// Opens an existing file for positional reads and writes.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        OpenOptions::new().read(true).write(true).open(path).await
    }

    /// Opens an existing file for positional reads only.
    ///
    /// Write operations on the returned handle fail with
    /// [`Error::ClosedForWriting`](crate::Error::ClosedForWriting).
    pub async fn open_readonly(path: impl AsRef<Path>) -> Result<Self> {
        OpenOptions::new().read(true).open(path).await
    }

    /// Creates (or truncates) a file for positional reads and writes.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await
    }

    /// Returns a builder for opening a file with fine-grained options.
    #[must_use]
    pub fn options() -> OpenOptions {
        OpenOptions::new()
    }

    pub(crate) fn from_inner(inner: FileInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Returns the current size of the file in bytes.
    pub async fn size(&self) -> Result<u64> {
        self.inner.size().await
    }

    /// Returns the path the file was opened from, if known.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.inner.path().map(PathBuf::as_path)
    }

    /// Reads up to `len` bytes starting at `offset`.
    ///
    /// Returns `None` if `offset` is at or past end-of-file, otherwise the
    /// bytes read, which may be fewer than `len`. A zero-length request
    /// succeeds with an empty result without touching the file.
    pub async fn read_at(&self, offset: i64, len: usize) -> Result<Option<Vec<u8>>> {
        self.inner.check_readable()?;
        let offset = self.resolve(offset).await?;
        if len == 0 {
            return Ok(Some(Vec::new()));
        }
        let data = self.inner.bounded_read(offset, len).await?;
        Ok(if data.is_empty() { None } else { Some(data) })
    }

    /// Reads up to `len` bytes starting at `offset` into a caller-supplied
    /// buffer, returning the count read.
    ///
    /// On success the buffer holds exactly the bytes read. Returns `None` and
    /// leaves the buffer empty when `offset` is at or past end-of-file; the
    /// buffer is also emptied if the read fails.
    pub async fn read_at_into(&self, offset: i64, len: usize, buf: &ByteBuf) -> Result<Option<usize>> {
        self.inner.check_readable()?;
        let offset = self.resolve(offset).await?;
        if len == 0 {
            buf.clear();
            return Ok(Some(0));
        }
        let n = self.inner.bounded_read_into(offset, len, buf.clone()).await?;
        Ok(if n == 0 { None } else { Some(n) })
    }

    /// Reads everything from `offset` to end-of-file.
    ///
    /// Returns `None` when there is nothing at or after `offset`.
    pub async fn read_to_end_at(&self, offset: i64) -> Result<Option<Vec<u8>>> {
        self.inner.check_readable()?;
        let offset = self.resolve(offset).await?;
        let data = self.inner.read_to_end(offset).await?;
        Ok(if data.is_empty() { None } else { Some(data) })
    }

    /// Reads everything from `offset` to end-of-file into a caller-supplied
    /// buffer, returning the count read.
    ///
    /// Returns `None` and leaves the buffer empty when there is nothing at or
    /// after `offset`; the buffer is also emptied if the read fails.
    pub async fn read_to_end_at_into(&self, offset: i64, buf: &ByteBuf) -> Result<Option<usize>> {
        self.inner.check_readable()?;
        let offset = self.resolve(offset).await?;
        let n = self.inner.read_to_end_into(offset, buf.clone()).await?;
        Ok(if n == 0 { None } else { Some(n) })
    }

    /// Writes `data` starting at `offset`, returning the count written.
    ///
    /// Writing past end-of-file extends the file; the platform leaves any gap
    /// as a hole that reads back as zero bytes. The write either transfers
    /// all of `data` or fails with
    /// [`Error::ShortWrite`](crate::Error::ShortWrite). A zero-length write
    /// succeeds without touching the file.
    pub async fn write_at(&self, offset: i64, data: &[u8]) -> Result<usize> {
        self.inner.check_writable()?;
        let offset = self.resolve(offset).await?;
        if data.is_empty() {
            return Ok(0);
        }
        self.inner.write_at(offset, data).await
    }

    /// Writes the contents of a shared buffer starting at `offset`.
    ///
    /// The buffer is pinned for the duration of the transfer, so a concurrent
    /// resize waits for the write to finish.
    pub async fn write_buf_at(&self, offset: i64, data: &ByteBuf) -> Result<usize> {
        self.inner.check_writable()?;
        let offset = self.resolve(offset).await?;
        if data.is_empty() {
            return Ok(0);
        }
        self.inner.write_buf_at(offset, data.clone()).await
    }

    /// Writes `data` at the current end-of-file.
    pub async fn append(&self, data: &[u8]) -> Result<usize> {
        self.inner.check_writable()?;
        if data.is_empty() {
            return Ok(0);
        }
        let offset = self.inner.size().await?;
        self.inner.write_at(offset, data).await
    }

    /// Resolves a signed offset against the current file size.
    ///
    /// Non-negative offsets pass through without a size query.
    async fn resolve(&self, offset: i64) -> Result<u64> {
        if let Ok(resolved) = u64::try_from(offset) {
            return Ok(resolved);
        }
        let size = self.inner.size().await?;
        offset::resolve(offset, size)
    }
}
