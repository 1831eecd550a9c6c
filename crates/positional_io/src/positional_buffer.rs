// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::byte_buf::ByteBuf;
use crate::error::{Error, Result};
use crate::offset;

/// An in-memory resource for reads and writes at explicit byte offsets.
///
/// Behaves like [`PositionalFile`](crate::PositionalFile) over a growable
/// byte buffer instead of an OS file: negative offsets resolve against the
/// current buffer length, writes past the end grow the buffer and zero-fill
/// the gap, and reads at or past the end report `None`.
///
/// The read and write halves can be closed independently with
/// [`close_read`](Self::close_read) and [`close_write`](Self::close_write);
/// operations on a closed half fail without touching the buffer.
///
/// Cloning is cheap and clones share both the buffer and the closed state.
#[derive(Clone, Debug, Default)]
pub struct PositionalBuffer {
    buf: ByteBuf,
    state: Arc<State>,
}

#[derive(Debug, Default)]
struct State {
    read_closed: AtomicBool,
    write_closed: AtomicBool,
}

impl PositionalBuffer {
    /// Creates an empty buffer-backed resource.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resource over an existing shared buffer.
    ///
    /// The resource and the caller see the same bytes; either side's changes
    /// are visible to the other.
    #[must_use]
    pub fn with_buffer(buf: ByteBuf) -> Self {
        Self {
            buf,
            state: Arc::default(),
        }
    }

    /// Returns a handle to the underlying shared buffer.
    #[must_use]
    pub fn buffer(&self) -> ByteBuf {
        self.buf.clone()
    }

    /// Returns the current size of the buffer in bytes.
    pub async fn size(&self) -> Result<u64> {
        Ok(self.buf.len() as u64)
    }

    /// Closes the read half; subsequent reads fail with
    /// [`Error::ClosedForReading`].
    pub fn close_read(&self) {
        self.state.read_closed.store(true, Ordering::Release);
    }

    /// Closes the write half; subsequent writes fail with
    /// [`Error::ClosedForWriting`].
    pub fn close_write(&self) {
        self.state.write_closed.store(true, Ordering::Release);
    }

    /// Closes both halves.
    pub fn close(&self) {
        self.close_read();
        self.close_write();
    }

    fn check_readable(&self) -> Result<()> {
        if self.state.read_closed.load(Ordering::Acquire) {
            Err(Error::ClosedForReading)
        } else {
            Ok(())
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.state.write_closed.load(Ordering::Acquire) {
            Err(Error::ClosedForWriting)
        } else {
            Ok(())
        }
    }

    /// Reads up to `len` bytes starting at `offset`.
    ///
    /// Returns `None` if `offset` is at or past the end of the buffer. A
    /// zero-length request succeeds with an empty result.
    pub async fn read_at(&self, offset: i64, len: usize) -> Result<Option<Vec<u8>>> {
        self.check_readable()?;
        let guard = self.buf.read_guard()?;
        Ok(read_range(&guard, offset, len)?.map(<[u8]>::to_vec))
    }

    /// Reads up to `len` bytes starting at `offset` into a caller-supplied
    /// buffer, returning the count read.
    ///
    /// The destination may share storage with this resource's own buffer; the
    /// bytes are staged so the copy still sees a consistent snapshot. Returns
    /// `None` and leaves the destination empty when `offset` is at or past
    /// the end.
    pub async fn read_at_into(&self, offset: i64, len: usize, buf: &ByteBuf) -> Result<Option<usize>> {
        let staged = self.read_at(offset, len).await?;
        unstage(staged, buf)
    }

    /// Reads everything from `offset` to the end of the buffer.
    ///
    /// Returns `None` when there is nothing at or after `offset`.
    pub async fn read_to_end_at(&self, offset: i64) -> Result<Option<Vec<u8>>> {
        self.check_readable()?;
        let guard = self.buf.read_guard()?;
        let start = offset::resolve(offset, guard.len() as u64)?;
        let Ok(start) = usize::try_from(start) else {
            return Ok(None);
        };
        if start >= guard.len() {
            return Ok(None);
        }
        Ok(Some(guard[start..].to_vec()))
    }

    /// Reads everything from `offset` into a caller-supplied buffer,
    /// returning the count read.
    ///
    /// Returns `None` and leaves the destination empty when there is nothing
    /// at or after `offset`.
    pub async fn read_to_end_at_into(&self, offset: i64, buf: &ByteBuf) -> Result<Option<usize>> {
        let staged = self.read_to_end_at(offset).await?;
        unstage(staged, buf)
    }

    /// Writes `data` starting at `offset`, returning the count written.
    ///
    /// Writing past the end grows the buffer, zero-filling any gap between
    /// the old end and `offset`. A zero-length write succeeds without
    /// touching the buffer.
    pub async fn write_at(&self, offset: i64, data: &[u8]) -> Result<usize> {
        self.check_writable()?;
        let mut guard = self.buf.write_guard()?;
        // The offset must be valid even for an empty payload.
        let resolved = offset::resolve(offset, guard.len() as u64)?;
        if data.is_empty() {
            return Ok(0);
        }
        let out_of_range = || Error::OutOfRange {
            offset: resolved,
            len: data.len(),
        };
        let Ok(start) = usize::try_from(resolved) else {
            return Err(out_of_range());
        };
        let end = start.checked_add(data.len()).ok_or_else(out_of_range)?;
        if end > guard.len() {
            guard.resize(end, 0);
        }
        guard[start..end].copy_from_slice(data);
        Ok(data.len())
    }

    /// Writes the contents of a shared buffer starting at `offset`.
    ///
    /// The source may be this resource's own buffer; its bytes are staged
    /// before the destination guard is taken.
    pub async fn write_buf_at(&self, offset: i64, data: &ByteBuf) -> Result<usize> {
        self.check_writable()?;
        let staged = data.to_vec();
        self.write_at(offset, &staged).await
    }

    /// Writes `data` at the current end of the buffer.
    pub async fn append(&self, data: &[u8]) -> Result<usize> {
        self.check_writable()?;
        if data.is_empty() {
            return Ok(0);
        }
        let mut guard = self.buf.write_guard()?;
        guard.extend_from_slice(data);
        Ok(data.len())
    }

}

/// Moves staged read bytes into the destination buffer.
///
/// Runs after the source guard is released, so a destination aliasing the
/// source cannot deadlock.
fn unstage(staged: Option<Vec<u8>>, buf: &ByteBuf) -> Result<Option<usize>> {
    let mut guard = buf.write_guard()?;
    match staged {
        Some(data) => {
            let n = data.len();
            *guard = data;
            Ok(Some(n))
        }
        None => {
            guard.clear();
            Ok(None)
        }
    }
}

/// Resolves and clamps a bounded read against the buffer contents.
///
/// A window whose end is not addressable is an error, even when the window
/// would be cut short at the end of the buffer anyway.
fn read_range(bytes: &[u8], offset: i64, len: usize) -> Result<Option<&[u8]>> {
    let resolved = offset::resolve(offset, bytes.len() as u64)?;
    if len == 0 {
        return Ok(Some(&[]));
    }
    let out_of_range = || Error::OutOfRange { offset: resolved, len };
    let Ok(start) = usize::try_from(resolved) else {
        return Err(out_of_range());
    };
    let end = start.checked_add(len).ok_or_else(out_of_range)?;
    if start >= bytes.len() {
        return Ok(None);
    }
    Ok(Some(&bytes[start..end.min(bytes.len())]))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use futures_lite::future::block_on;

    use super::*;

    #[test]
    fn bounded_read_and_clamp() {
        block_on(async {
            let buf = PositionalBuffer::with_buffer(ByteBuf::from(b"0123456789"));
            assert_eq!(buf.read_at(2, 4).await.unwrap().unwrap(), b"2345");
            assert_eq!(buf.read_at(7, 100).await.unwrap().unwrap(), b"789");
            assert_eq!(buf.read_at(10, 4).await.unwrap(), None);
            assert_eq!(buf.read_at(10, 0).await.unwrap().unwrap(), b"");
        });
    }

    #[test]
    fn negative_offsets_resolve_against_the_end() {
        block_on(async {
            let buf = PositionalBuffer::with_buffer(ByteBuf::from(b"0123456789"));
            assert_eq!(buf.read_at(-4, 4).await.unwrap().unwrap(), b"6789");
            assert_eq!(buf.read_to_end_at(-3).await.unwrap().unwrap(), b"789");
            assert!(matches!(
                buf.read_at(-11, 1).await.unwrap_err(),
                Error::InvalidOffset { offset: -11, size: 10 }
            ));
        });
    }

    #[test]
    fn oversized_read_window_is_out_of_range() {
        block_on(async {
            let buf = PositionalBuffer::with_buffer(ByteBuf::from(b"0123456789"));
            assert!(matches!(
                buf.read_at(5, usize::MAX).await.unwrap_err(),
                Error::OutOfRange { offset: 5, len: usize::MAX }
            ));
            // A window that merely runs past the end still clamps.
            assert_eq!(buf.read_at(5, 100).await.unwrap().unwrap(), b"56789");
        });
    }

    #[test]
    fn empty_write_still_validates_its_offset() {
        block_on(async {
            let buf = PositionalBuffer::with_buffer(ByteBuf::from(b"0123456789"));
            assert!(matches!(
                buf.write_at(-100, b"").await.unwrap_err(),
                Error::InvalidOffset { offset: -100, size: 10 }
            ));
            assert_eq!(buf.write_at(3, b"").await.unwrap(), 0);
            assert_eq!(buf.size().await.unwrap(), 10);
        });
    }

    #[test]
    fn write_past_the_end_zero_fills_the_gap() {
        block_on(async {
            let buf = PositionalBuffer::with_buffer(ByteBuf::from(b"0123456789"));
            assert_eq!(buf.write_at(12, b"AB").await.unwrap(), 2);
            assert_eq!(buf.buffer().to_vec(), b"0123456789\0\0AB");
            assert_eq!(buf.read_at(-4, 4).await.unwrap().unwrap(), b"\0\0AB");
        });
    }

    #[test]
    fn overlapping_write_replaces_in_place() {
        block_on(async {
            let buf = PositionalBuffer::with_buffer(ByteBuf::from(b"0123456789"));
            assert_eq!(buf.write_at(4, b"xyz").await.unwrap(), 3);
            assert_eq!(buf.buffer().to_vec(), b"0123xyz789");
        });
    }

    #[test]
    fn write_buf_at_accepts_its_own_buffer() {
        block_on(async {
            let buf = PositionalBuffer::with_buffer(ByteBuf::from(b"abc"));
            let n = buf.write_buf_at(3, &buf.buffer()).await.unwrap();
            assert_eq!(n, 3);
            assert_eq!(buf.buffer().to_vec(), b"abcabc");
        });
    }

    #[test]
    fn read_into_its_own_buffer_keeps_the_snapshot() {
        block_on(async {
            let buf = PositionalBuffer::with_buffer(ByteBuf::from(b"0123456789"));
            let dest = buf.buffer();
            let n = buf.read_at_into(2, 4, &dest).await.unwrap();
            assert_eq!(n, Some(4));
            assert_eq!(dest.to_vec(), b"2345");
        });
    }

    #[test]
    fn closed_halves_reject_their_operations() {
        block_on(async {
            let buf = PositionalBuffer::with_buffer(ByteBuf::from(b"data"));
            buf.close_read();
            assert!(matches!(buf.read_at(0, 4).await.unwrap_err(), Error::ClosedForReading));
            assert_eq!(buf.write_at(0, b"x").await.unwrap(), 1);

            buf.close_write();
            assert!(matches!(buf.write_at(0, b"x").await.unwrap_err(), Error::ClosedForWriting));
        });
    }

    #[test]
    fn append_extends_the_buffer() {
        block_on(async {
            let buf = PositionalBuffer::new();
            assert_eq!(buf.append(b"hello").await.unwrap(), 5);
            assert_eq!(buf.append(b" world").await.unwrap(), 6);
            assert_eq!(buf.buffer().to_vec(), b"hello world");
            assert_eq!(buf.size().await.unwrap(), 11);
        });
    }

    #[test]
    fn empty_buffer_unbounded_read_reports_no_data() {
        block_on(async {
            let buf = PositionalBuffer::new();
            assert_eq!(buf.read_to_end_at(0).await.unwrap(), None);
        });
    }
}
