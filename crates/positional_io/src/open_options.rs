// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::Path;

use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::file_inner::FileInner;
use crate::positional_file::PositionalFile;

/// A builder for opening a [`PositionalFile`] with fine-grained options.
///
/// Mirrors [`std::fs::OpenOptions`] but performs the blocking open on a
/// worker thread and records which positional operations the resulting file
/// permits. A file opened without read access rejects positional reads with
/// [`Error::ClosedForReading`](crate::Error::ClosedForReading), and one opened
/// without write or append access rejects positional writes with
/// [`Error::ClosedForWriting`](crate::Error::ClosedForWriting).
///
/// # Example
///
/// ```no_run
/// # async fn example() -> positional_io::Result<()> {
/// let file = positional_io::OpenOptions::new()
///     .read(true)
///     .write(true)
///     .create(true)
///     .open("data.bin")
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct OpenOptions {
    read: bool,
    write: bool,
    append: bool,
    truncate: bool,
    create: bool,
    create_new: bool,
}

impl OpenOptions {
    /// Creates a blank set of options, all flags off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the option for read access.
    #[must_use]
    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    /// Sets the option for write access.
    #[must_use]
    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    /// Sets the option for append mode.
    ///
    /// Note that on Unix, positional writes to a file opened in append mode
    /// ignore the offset and always land at end-of-file, per `pwrite(2)`
    /// semantics for `O_APPEND` descriptors.
    #[must_use]
    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Sets the option for truncating the file on open.
    #[must_use]
    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Sets the option to create the file if it does not exist.
    #[must_use]
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Sets the option to create a new file, failing if it already exists.
    #[must_use]
    pub fn create_new(mut self, create_new: bool) -> Self {
        self.create_new = create_new;
        self
    }

    /// Opens the file at `path` with this set of options.
    pub async fn open(self, path: impl AsRef<Path>) -> Result<PositionalFile> {
        let path = path.as_ref().to_path_buf();
        let readable = self.read;
        let writable = self.write || self.append;
        let (file, path) = Dispatcher::global()
            .dispatch(move || {
                let mut options = std::fs::OpenOptions::new();
                options
                    .read(self.read)
                    .write(self.write)
                    .append(self.append)
                    .truncate(self.truncate)
                    .create(self.create)
                    .create_new(self.create_new);
                match options.open(&path) {
                    Ok(file) => Ok((file, path)),
                    Err(e) => Err(Error::Io {
                        source: e,
                        path: Some(path),
                    }),
                }
            })
            .await?;
        Ok(PositionalFile::from_inner(FileInner::new(
            file,
            Some(path),
            readable,
            writable,
        )))
    }
}
