//! One-shot compression of whole entries
//!
//! Every archived file is compressed independently into a single zstd frame
//! sequence, so any box can be decompressed without the ones before it.
//! Compressing zero bytes still yields a small non-empty frame.
//!
//! Decompression can be capped: a frame that expands past the limit fails
//! with `InvalidData` once the limit is crossed, without buffering the rest.

use std::io::{self, Read};

/// Default zstd level, in line with a "best compression" preset.
pub const DEFAULT_LEVEL: i32 = 11;

/// Stateless one-shot codec used for each archive entry.
///
/// Implementations must be lossless: `decompress(compress(x)) == x`.
pub trait Compressor: Send + Sync {
    fn compress(&self, raw: &[u8]) -> io::Result<Vec<u8>>;
    fn decompress(&self, packed: &[u8]) -> io::Result<Vec<u8>>;
}

/// zstd via `zstd::encode_all` and a streaming decoder.
#[derive(Debug, Clone, Copy)]
pub struct Zstd {
    level: i32,
    max_output: Option<u64>,
}

impl Zstd {
    pub fn new(level: i32) -> Self {
        Self {
            level,
            max_output: None,
        }
    }

    /// Refuse to decompress any entry larger than `limit` bytes.
    pub fn with_max_output(self, limit: u64) -> Self {
        Self {
            max_output: Some(limit),
            ..self
        }
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn max_output(&self) -> Option<u64> {
        self.max_output
    }
}

impl Default for Zstd {
    fn default() -> Self {
        Self::new(DEFAULT_LEVEL)
    }
}

impl Compressor for Zstd {
    fn compress(&self, raw: &[u8]) -> io::Result<Vec<u8>> {
        zstd::encode_all(raw, self.level)
    }

    fn decompress(&self, packed: &[u8]) -> io::Result<Vec<u8>> {
        let Some(limit) = self.max_output else {
            return zstd::decode_all(packed);
        };

        // One byte past the limit is enough to tell "exactly at" from "over"
        let mut out = Vec::new();
        zstd::stream::Decoder::new(packed)?
            .take(limit.saturating_add(1))
            .read_to_end(&mut out)?;
        if out.len() as u64 > limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("decompressed entry exceeds {limit} bytes"),
            ));
        }
        Ok(out)
    }
}
