use std::path::PathBuf;

use thiserror::Error;

pub type PackdResult<T> = Result<T, PackdError>;

/// Structural problems in an archive byte stream.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("invalid signature: expected <!PAKD!> marker, found {found:02x?}")]
    InvalidSignature { found: Vec<u8> },

    #[error("truncated archive: needed {needed} bytes at offset {offset}, only {available} available")]
    Truncated {
        offset: u64,
        needed: u64,
        available: u64,
    },

    #[error("corrupt entry '{path}' at offset {offset}: {source}")]
    CorruptEntry {
        path: String,
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("entry path at offset {offset} is not valid UTF-8")]
    InvalidPath { offset: u64 },

    #[error("path too long: {len} bytes (max {}): {path}", u16::MAX)]
    PathTooLong { path: String, len: usize },

    #[error("unsafe entry path rejected: {path}")]
    UnsafePath { path: String },
}

/// Failures of the hybrid encryption envelope and key handling.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("symmetric key of {key_len} bytes exceeds the RSA-OAEP payload limit of {max} bytes; use a larger key")]
    KeyTooLarge { key_len: usize, max: usize },

    #[error("failed to unwrap archive key: private key does not match or wrapped key is corrupt")]
    KeyUnwrap,

    #[error("integrity check failed: wrong key, tampered or corrupted archive")]
    Integrity,

    #[error("archive is sealed; a private key is required")]
    KeyRequired,

    #[error("envelope length mismatch: declared {declared} bytes, only {available} available")]
    LengthMismatch { declared: u64, available: u64 },

    #[error("failed to load key from {}: {reason}", .path.display())]
    KeyLoad { path: PathBuf, reason: String },

    #[error("archive header says encrypted={header_flag} but envelope present={sealed}")]
    EncryptionFlagMismatch { header_flag: bool, sealed: bool },

    #[error("encryption failed: {0}")]
    Encrypt(String),
}

#[derive(Debug, Error)]
pub enum PackdError {
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("compression failed for '{path}': {source}")]
    Compression {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file name is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("config error: {0}")]
    Config(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl PackdError {
    /// Attach the offending filesystem path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
