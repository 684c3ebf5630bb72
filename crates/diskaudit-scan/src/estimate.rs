//! Gzip size estimation.
//!
//! Content is streamed through a gzip encoder into a sink that only counts
//! bytes, so memory use does not grow with file size.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::write::GzEncoder;

pub use diskaudit_core::DEFAULT_GZIP_LEVEL;

/// Sizes measured for one file's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeEstimate {
    /// Bytes of content read.
    pub text_size: u64,
    /// Bytes of gzip output for that content.
    pub gzip_size: u64,
}

/// Compress `prefix` followed by everything left in `rest`.
///
/// The prefix is the part already read for classification. `text_size` counts
/// what was actually read, so a file that changed since it was stat'd is
/// measured as it is now.
pub fn estimate(prefix: &[u8], mut rest: impl Read, level: u32) -> io::Result<SizeEstimate> {
    let mut encoder = GzEncoder::new(ByteCounter::default(), Compression::new(level.min(9)));
    encoder.write_all(prefix)?;
    let copied = io::copy(&mut rest, &mut encoder)?;
    let sink = encoder.finish()?;

    Ok(SizeEstimate {
        text_size: prefix.len() as u64 + copied,
        gzip_size: sink.count,
    })
}

/// Estimate sizes for content already in memory.
pub fn estimate_bytes(content: &[u8], level: u32) -> SizeEstimate {
    // Writes into ByteCounter cannot fail.
    estimate(content, io::empty(), level).unwrap_or(SizeEstimate {
        text_size: content.len() as u64,
        gzip_size: 0,
    })
}

/// Writer that discards data and counts bytes.
#[derive(Debug, Default)]
struct ByteCounter {
    count: u64,
}

impl Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.count += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
