// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Any error that may arise from a positional read or write.
///
/// Every failure aborts the operation it occurred in; no partial result is
/// returned alongside an error, and a caller-supplied buffer involved in a
/// failed transfer is left empty rather than half-filled.
///
/// # Thread safety
///
/// This type is thread-safe.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An end-relative offset resolved to a position before the start of the
    /// resource.
    #[error("offset {offset} resolves before the start of the resource (size {size})")]
    InvalidOffset {
        /// The raw, caller-supplied offset.
        offset: i64,
        /// The resource size the offset was resolved against.
        size: u64,
    },

    /// The combination of offset and length exceeds the addressable range of
    /// the resource.
    #[error("offset {offset} and length {len} exceed the addressable range")]
    OutOfRange {
        /// The resolved absolute offset.
        offset: u64,
        /// The requested transfer length.
        len: usize,
    },

    /// An underlying OS call failed.
    ///
    /// The originating path is attached when the resource knows it.
    #[error("i/o failure{}: {source}", .path.as_ref().map(|p| format!(" on {}", p.display())).unwrap_or_default())]
    Io {
        /// The OS-level error, including the errno when one was reported.
        source: std::io::Error,
        /// The path of the resource, when known.
        path: Option<PathBuf>,
    },

    /// The resource is not open for reading.
    #[error("resource is not opened for reading")]
    ClosedForReading,

    /// The resource is not open for writing.
    #[error("resource is not opened for writing")]
    ClosedForWriting,

    /// The OS accepted fewer bytes than requested.
    ///
    /// Partial writes are never silently retried; the count that did reach
    /// the resource is reported here.
    #[error("short write: {written} of {requested} bytes")]
    ShortWrite {
        /// Bytes the OS actually accepted.
        written: usize,
        /// Bytes the caller asked to write.
        requested: usize,
    },
}

impl Error {
    /// Returns the raw OS error code for [`Io`](Error::Io) failures that
    /// carry one.
    #[must_use]
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Io { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    pub(crate) fn io(source: std::io::Error, path: Option<&Arc<PathBuf>>) -> Self {
        Self::Io {
            source,
            path: path.map(|p| p.as_ref().clone()),
        }
    }

    /// A lock guarding a buffer or file was poisoned by a panicking thread.
    pub(crate) fn poisoned(cause: impl std::fmt::Display) -> Self {
        Self::Io {
            source: std::io::Error::other(format!("lock poisoned: {cause}")),
            path: None,
        }
    }
}

/// A specialized `Result` for positional I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a positional I/O error as a standard I/O error.
/// This is often used when interoperating with other libraries that expect standard I/O errors.
impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Io { source, .. } => source,
            _ => Self::other(value),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use std::io::ErrorKind;

    use super::*;

    #[test]
    fn errno_is_forwarded_from_os_errors() {
        let err = Error::io(std::io::Error::from_raw_os_error(9), None);
        assert_eq!(err.errno(), Some(9));
        assert_eq!(Error::ClosedForReading.errno(), None);
    }

    #[test]
    fn display_includes_path_when_known() {
        let path = Arc::new(PathBuf::from("/tmp/data.bin"));
        let err = Error::io(std::io::Error::new(ErrorKind::NotFound, "gone"), Some(&path));
        let text = err.to_string();
        assert!(text.contains("/tmp/data.bin"), "{text}");
    }

    #[test]
    fn conversion_to_std_io_error_preserves_kind() {
        let err = Error::io(std::io::Error::new(ErrorKind::PermissionDenied, "nope"), None);
        let std_err: std::io::Error = err.into();
        assert_eq!(std_err.kind(), ErrorKind::PermissionDenied);

        let std_err: std::io::Error = Error::ClosedForWriting.into();
        assert_eq!(std_err.kind(), ErrorKind::Other);
    }
}
