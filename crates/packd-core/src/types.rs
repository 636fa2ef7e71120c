use serde::{Deserialize, Serialize};

/// One regular file of a directory tree, fully materialised in memory.
///
/// `path` is relative to the archived root, uses `/` separators and never
/// starts with a slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub contents: Vec<u8>,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

/// Listing view of an archived entry (for `list` / `verify` output)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub path: String,
    /// Size of the compressed payload stored in the box
    pub compressed_size: u64,
    /// Size after decompression
    pub raw_size: u64,
    /// BLAKE3 of the decompressed bytes, lowercase hex
    pub blake3: String,
}
