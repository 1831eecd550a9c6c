// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Cursor-independent positional reads and writes over files and in-memory
//! buffers.
//!
//! Ordinary stream I/O funnels every operation through a single shared
//! cursor, which makes concurrent access to one handle a race. This crate
//! instead names the byte offset in every call: reads and writes say where
//! they act, the underlying platform calls (`pread`/`pwrite` on Unix) leave
//! the cursor alone, and independent operations on the same resource can
//! proceed in parallel.
//!
//! Two resource kinds share one surface:
//!
//! * [`PositionalFile`] wraps an OS file and runs its blocking syscalls on a
//!   small worker pool, so the async operations never stall the calling
//!   runtime.
//! * [`PositionalBuffer`] provides the same operations over a growable
//!   in-memory buffer, useful for tests and for staging data.
//!
//! The [`PositionalRead`] and [`PositionalWrite`] traits abstract over both.
//!
//! Offsets are signed: negative values resolve against the resource's
//! current size, so `-4` names the fourth byte from the end. Bounded reads
//! report end-of-data as `None` rather than an empty success, and unbounded
//! reads collect everything from the offset to the end in fixed-size chunks.
//!
//! [`ByteBuf`] is a cheaply clonable shared buffer that operations can fill
//! in place. While a transfer is using one, the buffer is pinned; a
//! concurrent resize waits for the transfer to finish instead of pulling the
//! storage out from under it.
//!
//! # Example
//!
//! ```no_run
//! use positional_io::{PositionalFile, PositionalRead, PositionalWrite};
//!
//! # async fn example() -> positional_io::Result<()> {
//! let file = PositionalFile::create("data.bin").await?;
//! file.write_at(0, b"0123456789").await?;
//! file.write_at(12, b"AB").await?;
//!
//! // The gap left by the second write reads back as zeros.
//! let tail = file.read_at(-4, 4).await?;
//! assert_eq!(tail.as_deref(), Some(&b"\0\0AB"[..]));
//! # Ok(())
//! # }
//! ```

mod accumulator;
mod byte_buf;
mod dispatcher;
mod error;
mod file_inner;
mod offset;
mod open_options;
mod positional_buffer;
mod positional_file;
mod traits;

pub use byte_buf::ByteBuf;
pub use error::{Error, Result};
pub use open_options::OpenOptions;
pub use positional_buffer::PositionalBuffer;
pub use positional_file::PositionalFile;
pub use traits::{PositionalRead, PositionalWrite};
