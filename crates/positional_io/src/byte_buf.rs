// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};

/// A shared, growable byte sequence with a transfer-lock discipline.
///
/// `ByteBuf` is the buffer type consumed and produced by every positional
/// operation. Cloning is cheap and produces a second handle to the *same*
/// storage, which is how a caller keeps hold of a buffer that is
/// simultaneously the destination of an in-flight transfer.
///
/// # Lock discipline
///
/// While a transfer holds the buffer's storage — for example while a blocking
/// `pread` fills it on a worker thread — the storage is pinned by an RAII
/// guard. Any concurrent [`resize`](ByteBuf::resize), [`clear`](ByteBuf::clear),
/// or conflicting transfer on another handle blocks until the guard is
/// released, which happens on every exit path of the transfer, including
/// failure and cancellation. The guard pins the backing pointer and the
/// length metadata; it makes no promise about who writes the *contents*.
#[derive(Clone, Default)]
pub struct ByteBuf {
    inner: Arc<RwLock<Vec<u8>>>,
}

impl ByteBuf {
    /// Creates a new, empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copies the current contents out into a fresh `Vec`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.read().clone()
    }

    /// Resizes the buffer to `new_len` bytes, zero-filling any growth.
    ///
    /// Blocks while a transfer holds the buffer's storage.
    pub fn resize(&self, new_len: usize) {
        self.write().resize(new_len, 0);
    }

    /// Empties the buffer.
    ///
    /// Blocks while a transfer holds the buffer's storage.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Shared access for the duration of a transfer that reads the contents.
    pub(crate) fn read_guard(&self) -> Result<RwLockReadGuard<'_, Vec<u8>>> {
        self.inner.read().map_err(Error::poisoned)
    }

    /// Exclusive access for the duration of a transfer that fills or resizes
    /// the contents.
    pub(crate) fn write_guard(&self) -> Result<RwLockWriteGuard<'_, Vec<u8>>> {
        self.inner.write().map_err(Error::poisoned)
    }

    // Accessors recover the guard from a poisoned lock rather than failing:
    // the invariant protected by the lock is the storage itself, which stays
    // structurally valid even if a holder panicked.
    fn read(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<u8>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<Vec<u8>> for ByteBuf {
    fn from(value: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }
}

impl From<&[u8]> for ByteBuf {
    fn from(value: &[u8]) -> Self {
        Self::from(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for ByteBuf {
    fn from(value: &[u8; N]) -> Self {
        Self::from(value.to_vec())
    }
}

impl fmt::Debug for ByteBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuf").field("len", &self.len()).finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn clones_share_storage() {
        let buf = ByteBuf::from(&b"abc"[..]);
        let other = buf.clone();
        other.resize(5);
        assert_eq!(buf.to_vec(), b"abc\0\0");
        assert_eq!(other.to_vec(), buf.to_vec());
    }

    #[test]
    fn growth_is_zero_filled() {
        let buf = ByteBuf::new();
        buf.resize(4);
        assert_eq!(buf.to_vec(), vec![0; 4]);
        buf.clear();
        assert!(buf.is_empty());
    }

    #[test]
    fn resize_blocks_until_the_transfer_guard_drops() {
        let buf = ByteBuf::from(vec![7u8; 16]);
        let guard = buf.write_guard().unwrap();

        let (started_tx, started_rx) = mpsc::channel();
        let contender = buf.clone();
        let resizer = thread::spawn(move || {
            started_tx.send(()).unwrap();
            contender.resize(1);
        });

        // The contender is running but cannot shrink the storage out from
        // under the held guard.
        started_rx.recv().unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(guard.len(), 16);

        drop(guard);
        resizer.join().unwrap();
        assert_eq!(buf.len(), 1);
    }
}
