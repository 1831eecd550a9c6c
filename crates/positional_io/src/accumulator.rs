// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The chunk loop behind unbounded ("read to end") transfers.

use crate::error::{Error, Result};

/// How much a single chunk of an unbounded read requests.
pub(crate) const CHUNK_SIZE: usize = 1024 * 1024;

/// Repeatedly invokes a bounded transfer at an advancing offset until it
/// reports end-of-resource, collecting the chunks.
///
/// `read_chunk` receives the absolute offset to read at and a scratch chunk to
/// fill, and returns how many bytes it placed at the front of the chunk. A
/// short (but non-zero) chunk is not end-of-resource; the loop simply
/// continues from wherever the accumulated length now ends, which also
/// re-requests whatever a short OS read left behind. A zero-byte chunk stops
/// the loop.
///
/// On error the partial accumulation is dropped and the error propagates;
/// unbounded reads are all-or-nothing.
pub(crate) fn read_to_end<F>(start: u64, chunk_size: usize, mut read_chunk: F) -> Result<Vec<u8>>
where
    F: FnMut(u64, &mut [u8]) -> Result<usize>,
{
    let mut collected = Vec::new();
    let mut chunk = vec![0u8; chunk_size];
    loop {
        let offset = start
            .checked_add(collected.len() as u64)
            .ok_or(Error::OutOfRange {
                offset: start,
                len: collected.len(),
            })?;
        let n = read_chunk(offset, &mut chunk)?;
        if n == 0 {
            return Ok(collected);
        }
        collected.extend_from_slice(&chunk[..n]);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;

    // A bounded transfer over an in-memory source, optionally capped to force
    // short chunks.
    fn source_reader(source: &[u8], cap: usize) -> impl FnMut(u64, &mut [u8]) -> Result<usize> + '_ {
        move |offset, chunk| {
            let offset = usize::try_from(offset).unwrap();
            if offset >= source.len() {
                return Ok(0);
            }
            let n = chunk.len().min(cap).min(source.len() - offset);
            chunk[..n].copy_from_slice(&source[offset..offset + n]);
            Ok(n)
        }
    }

    #[test]
    fn collects_across_multiple_chunks() {
        let source: Vec<u8> = (0..=255).cycle().take(1000).collect();
        let collected = read_to_end(0, 64, source_reader(&source, usize::MAX)).unwrap();
        assert_eq!(collected, source);
    }

    #[test]
    fn short_chunks_are_retried_not_treated_as_eof() {
        let source = b"positional".as_slice();
        let collected = read_to_end(0, 64, source_reader(source, 3)).unwrap();
        assert_eq!(collected, source);
    }

    #[test]
    fn starts_mid_resource_and_reports_empty_at_end() {
        let source = b"0123456789".as_slice();
        assert_eq!(read_to_end(7, 4, source_reader(source, usize::MAX)).unwrap(), b"789");
        assert!(read_to_end(10, 4, source_reader(source, usize::MAX)).unwrap().is_empty());
    }

    #[test]
    fn errors_discard_the_partial_accumulation() {
        let mut calls = 0;
        let result = read_to_end(0, 8, |_, chunk| {
            calls += 1;
            if calls == 3 {
                return Err(Error::ClosedForReading);
            }
            chunk.fill(0xAA);
            Ok(chunk.len())
        });
        assert!(matches!(result, Err(Error::ClosedForReading)));
    }
}
