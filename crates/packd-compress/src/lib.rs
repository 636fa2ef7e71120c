//! packd-compress: per-entry compression and content digests
//!
//! # Overview
//! - `adapter`: the `Compressor` seam used by the archive codec, with a
//!   one-shot zstd implementation (`Zstd`)
//! - `digest`: BLAKE3 hashing of decompressed entry contents for listings
//!   and verification

pub mod adapter;
pub mod digest;

pub use adapter::{Compressor, Zstd, DEFAULT_LEVEL};
pub use digest::{digest, digest_hex, Hash};
