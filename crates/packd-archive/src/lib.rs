//! packd-archive: the `.pakd` single-file container
//!
//! On-disk layout (all integers little-endian):
//! ```text
//! [8]  marker       3C 21 50 41 4B 44 21 3E  ("<!PAKD!>")
//! [8]  header       encrypted flag (1) + reserved zeros (7)
//! repeated box:
//!   [2]  path length (u16)
//!   [8]  data length (u64, compressed size)
//!   [..] path (UTF-8, '/'-separated, root-relative)
//!   [..] zstd-compressed file contents
//! ```
//!
//! When the flag is set, the whole stream above is the plaintext of a
//! `packd_crypto` envelope and the file on disk is the envelope.
//!
//! - `format`: marker, archive header, box header
//! - `encode` / `decode`: pure bytes-in, bytes-out codec
//! - `walk`: directory traversal into sorted `FileEntry` values
//! - `writer` / `reader`: filesystem orchestration, encryption, extraction

pub mod decode;
pub mod encode;
pub mod format;
pub mod reader;
pub mod walk;
pub mod writer;

pub use decode::{decode, BoxReader, DecodedArchive, DecodedEntry};
pub use encode::{encode_dir, encode_entries, EncodeOptions, EncodedArchive};
pub use format::{
    ArchiveHeader, BoxHeader, ARCHIVE_HEADER_LEN, BOX_HEADER_LEN, MARKER, MARKER_LEN,
};
pub use reader::{
    check_entry_path, list, unpack, verify, Identity, ReadOptions, UnpackOptions,
    UnpackSummary,
};
pub use walk::{read_tree, walk, SourceFile, WalkOptions};
pub use writer::{pack, PackOptions, PackSummary, Recipient};
