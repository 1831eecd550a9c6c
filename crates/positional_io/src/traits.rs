// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::byte_buf::ByteBuf;
use crate::error::Result;
use crate::positional_buffer::PositionalBuffer;
use crate::positional_file::PositionalFile;

/// Reads at explicit byte offsets, independent of any stream cursor.
///
/// Implemented by [`PositionalFile`] and [`PositionalBuffer`], so code can be
/// written once against either backing resource:
///
/// ```no_run
/// use positional_io::PositionalRead;
///
/// async fn header(source: &impl PositionalRead) -> positional_io::Result<Option<Vec<u8>>> {
///     source.read_at(0, 16).await
/// }
/// ```
///
/// Offsets are signed; negative values resolve against the resource's
/// current size. Bounded reads return `None` at or past end-of-data,
/// unbounded reads return `None` when nothing was available.
pub trait PositionalRead {
    /// Reads up to `len` bytes starting at `offset`.
    fn read_at(&self, offset: i64, len: usize) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Reads up to `len` bytes starting at `offset` into `buf`.
    ///
    /// On success `buf` holds exactly the bytes read; it is left empty at
    /// end-of-data and on failure.
    fn read_at_into(
        &self,
        offset: i64,
        len: usize,
        buf: &ByteBuf,
    ) -> impl Future<Output = Result<Option<usize>>> + Send;

    /// Reads everything from `offset` to end-of-data.
    fn read_to_end_at(&self, offset: i64) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Reads everything from `offset` to end-of-data into `buf`.
    fn read_to_end_at_into(
        &self,
        offset: i64,
        buf: &ByteBuf,
    ) -> impl Future<Output = Result<Option<usize>>> + Send;

    /// Returns the current size of the resource in bytes.
    fn size(&self) -> impl Future<Output = Result<u64>> + Send;
}

/// Writes at explicit byte offsets, independent of any stream cursor.
///
/// Writing past end-of-data grows the resource; any gap reads back as zero
/// bytes. A write transfers everything or fails, never silently short.
pub trait PositionalWrite {
    /// Writes `data` starting at `offset`, returning the count written.
    fn write_at(&self, offset: i64, data: &[u8]) -> impl Future<Output = Result<usize>> + Send;

    /// Writes the contents of `data` starting at `offset`.
    fn write_buf_at(&self, offset: i64, data: &ByteBuf) -> impl Future<Output = Result<usize>> + Send;

    /// Writes `data` at the current end of the resource.
    fn append(&self, data: &[u8]) -> impl Future<Output = Result<usize>> + Send;
}

impl PositionalRead for PositionalFile {
    async fn read_at(&self, offset: i64, len: usize) -> Result<Option<Vec<u8>>> {
        Self::read_at(self, offset, len).await
    }

    async fn read_at_into(&self, offset: i64, len: usize, buf: &ByteBuf) -> Result<Option<usize>> {
        Self::read_at_into(self, offset, len, buf).await
    }

    async fn read_to_end_at(&self, offset: i64) -> Result<Option<Vec<u8>>> {
        Self::read_to_end_at(self, offset).await
    }

    async fn read_to_end_at_into(&self, offset: i64, buf: &ByteBuf) -> Result<Option<usize>> {
        Self::read_to_end_at_into(self, offset, buf).await
    }

    async fn size(&self) -> Result<u64> {
        Self::size(self).await
    }
}

impl PositionalWrite for PositionalFile {
    async fn write_at(&self, offset: i64, data: &[u8]) -> Result<usize> {
        Self::write_at(self, offset, data).await
    }

    async fn write_buf_at(&self, offset: i64, data: &ByteBuf) -> Result<usize> {
        Self::write_buf_at(self, offset, data).await
    }

    async fn append(&self, data: &[u8]) -> Result<usize> {
        Self::append(self, data).await
    }
}

impl PositionalRead for PositionalBuffer {
    async fn read_at(&self, offset: i64, len: usize) -> Result<Option<Vec<u8>>> {
        Self::read_at(self, offset, len).await
    }

    async fn read_at_into(&self, offset: i64, len: usize, buf: &ByteBuf) -> Result<Option<usize>> {
        Self::read_at_into(self, offset, len, buf).await
    }

    async fn read_to_end_at(&self, offset: i64) -> Result<Option<Vec<u8>>> {
        Self::read_to_end_at(self, offset).await
    }

    async fn read_to_end_at_into(&self, offset: i64, buf: &ByteBuf) -> Result<Option<usize>> {
        Self::read_to_end_at_into(self, offset, buf).await
    }

    async fn size(&self) -> Result<u64> {
        Self::size(self).await
    }
}

impl PositionalWrite for PositionalBuffer {
    async fn write_at(&self, offset: i64, data: &[u8]) -> Result<usize> {
        Self::write_at(self, offset, data).await
    }

    async fn write_buf_at(&self, offset: i64, data: &ByteBuf) -> Result<usize> {
        Self::write_buf_at(self, offset, data).await
    }

    async fn append(&self, data: &[u8]) -> Result<usize> {
        Self::append(self, data).await
    }
}
