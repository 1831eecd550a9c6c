// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Positional file I/O — reading and writing at explicit offsets.
//!
//! Positional methods like [`PositionalFile::read_at`] and
//! [`PositionalFile::write_at`] name the byte offset in every call, so no
//! shared cursor is involved and concurrent access to different regions of
//! the same file is safe.

use positional_io::PositionalFile;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    let file = PositionalFile::create(tmp.path().join("pos.bin")).await?;

    // Seed the file with known content.
    file.write_at(0, b"AAAA____BBBB").await?;

    // Overwrite the middle section without touching the rest.
    file.write_at(4, b"XXXX").await?;

    // Read back individual regions, including one named from the end.
    let head = file.read_at(0, 4).await?;
    let mid = file.read_at(4, 4).await?;
    let tail = file.read_at(-4, 4).await?;
    println!("head={head:?}  mid={mid:?}  tail={tail:?}");

    // A write past end-of-file extends the file; the gap reads back as zeros.
    file.write_at(14, b"!!").await?;
    let all = file.read_to_end_at(0).await?;
    println!("size={}  all={all:?}", file.size().await?);

    Ok(())
}
