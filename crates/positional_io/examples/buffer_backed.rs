// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The same positional surface over an in-memory buffer.
//!
//! [`PositionalBuffer`] implements [`PositionalRead`] and
//! [`PositionalWrite`] just like [`PositionalFile`] does, so code written
//! against the traits runs unchanged over either resource.

use positional_io::{ByteBuf, PositionalBuffer, PositionalRead, PositionalWrite, Result};

async fn stamp_footer(resource: &(impl PositionalRead + PositionalWrite)) -> Result<()> {
    resource.append(b"[END]").await?;
    println!("footer stamped at offset {}", resource.size().await? - 5);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let buffer = PositionalBuffer::with_buffer(ByteBuf::from(b"0123456789"));

    // Writing past the end grows the buffer and zero-fills the gap.
    buffer.write_at(12, b"AB").await?;
    println!("contents: {:?}", buffer.buffer().to_vec());

    // Negative offsets count back from the end.
    if let Some(tail) = buffer.read_at(-4, 4).await? {
        println!("tail: {tail:?}");
    }

    // Generic code sees the buffer and a file identically.
    stamp_footer(&buffer).await?;
    println!("after footer: {:?}", buffer.read_to_end_at(0).await?);

    // The halves close independently.
    buffer.close_write();
    assert!(buffer.write_at(0, b"x").await.is_err());
    assert!(buffer.read_at(0, 1).await.is_ok());

    Ok(())
}
