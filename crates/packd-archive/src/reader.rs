//! Unpack, list and verify `.pakd` files
//!
//! A file that starts with the `<!PAKD!>` marker is a plaintext archive.
//! Anything else is treated as a sealed envelope and needs a private key;
//! without one, a well-formed envelope is reported as `KeyRequired`.
//! After opening, the header's encryption flag must agree with how the file
//! was stored; a disagreement is reported as a crypto error rather than a
//! parse failure.
//!
//! Extraction decodes and validates every entry before the first file is
//! written, so a corrupt or hostile archive leaves the output directory
//! untouched.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use packd_compress::{digest_hex, Zstd};
use packd_core::{CryptoError, EntryInfo, FormatError, PackdError, PackdResult};
use packd_crypto::RsaPrivateKey;
use tracing::{debug, info, warn};

use crate::decode::{decode, DecodedArchive};
use crate::format::has_marker;

/// Where the private key for a sealed archive comes from.
#[derive(Debug, Clone)]
pub enum Identity {
    /// PEM file (PKCS#1 or PKCS#8)
    Pem(PathBuf),
    Key(RsaPrivateKey),
}

impl Identity {
    fn resolve(&self) -> PackdResult<RsaPrivateKey> {
        match self {
            Identity::Pem(path) => Ok(packd_crypto::load_private_key(path)?),
            Identity::Key(key) => Ok(key.clone()),
        }
    }
}

/// Settings shared by `list` and `verify`.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub identity: Option<Identity>,
    /// Largest decompressed entry accepted; `None` means unlimited
    pub max_entry_size: Option<u64>,
}

impl ReadOptions {
    pub fn with_identity(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            max_entry_size: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnpackOptions {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub identity: Option<Identity>,
    /// Largest decompressed entry accepted; `None` means unlimited
    pub max_entry_size: Option<u64>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl UnpackOptions {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            identity: None,
            max_entry_size: None,
            cancel: None,
        }
    }
}

/// Outcome of a successful `unpack`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackSummary {
    /// Boxes in the archive, duplicates included
    pub entries: usize,
    /// Decompressed bytes written
    pub bytes_written: u64,
    pub encrypted: bool,
}

/// Extract every entry of `options.input` under `options.output_dir`.
///
/// A path that appears more than once is written each time; the last box wins.
pub fn unpack(options: &UnpackOptions) -> PackdResult<UnpackSummary> {
    let archive = load(
        &options.input,
        options.identity.as_ref(),
        options.max_entry_size,
    )?;
    for entry in &archive.entries {
        check_entry_path(&entry.path)?;
    }

    std::fs::create_dir_all(&options.output_dir)
        .map_err(|e| PackdError::io(&options.output_dir, e))?;

    let mut bytes_written = 0u64;
    for (written, entry) in archive.entries.iter().enumerate() {
        if options
            .cancel
            .as_deref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
        {
            warn!(
                output = %options.output_dir.display(),
                written,
                total = archive.entries.len(),
                "unpack cancelled; output directory is incomplete"
            );
            return Err(PackdError::Cancelled);
        }

        let dest = options.output_dir.join(&entry.path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PackdError::io(parent, e))?;
        }
        std::fs::write(&dest, &entry.contents).map_err(|e| PackdError::io(&dest, e))?;
        debug!(path = %entry.path, bytes = entry.contents.len(), "extracted");
        bytes_written += entry.contents.len() as u64;
    }

    let summary = UnpackSummary {
        entries: archive.entries.len(),
        bytes_written,
        encrypted: archive.header.encrypted,
    };
    info!(
        input = %options.input.display(),
        output = %options.output_dir.display(),
        entries = summary.entries,
        bytes = summary.bytes_written,
        "archive extracted"
    );
    Ok(summary)
}

/// Entry metadata in archive order, without writing anything.
pub fn list(input: &Path, options: &ReadOptions) -> PackdResult<Vec<EntryInfo>> {
    let archive = load(input, options.identity.as_ref(), options.max_entry_size)?;
    Ok(archive
        .entries
        .iter()
        .map(|entry| EntryInfo {
            path: entry.path.clone(),
            compressed_size: entry.compressed_size,
            raw_size: entry.contents.len() as u64,
            blake3: digest_hex(&entry.contents),
        })
        .collect())
}

/// Fully decode (and open, if sealed) an archive. Returns the entry count.
pub fn verify(input: &Path, options: &ReadOptions) -> PackdResult<usize> {
    let archive = load(input, options.identity.as_ref(), options.max_entry_size)?;
    for entry in &archive.entries {
        check_entry_path(&entry.path)?;
    }
    info!(
        input = %input.display(),
        entries = archive.entries.len(),
        encrypted = archive.header.encrypted,
        "archive verified"
    );
    Ok(archive.entries.len())
}

/// Read, open if sealed, and decode.
fn load(
    input: &Path,
    identity: Option<&Identity>,
    max_entry_size: Option<u64>,
) -> PackdResult<DecodedArchive> {
    // Key problems surface before the archive is read
    let private = identity.map(Identity::resolve).transpose()?;

    let raw = std::fs::read(input).map_err(|e| PackdError::io(input, e))?;

    let (plaintext, sealed) = if has_marker(&raw) {
        if private.is_some() {
            debug!(input = %input.display(), "archive is not sealed; private key unused");
        }
        (raw, false)
    } else {
        match &private {
            Some(key) => (packd_crypto::open(&raw, key)?, true),
            None if packd_crypto::is_envelope(&raw) => {
                return Err(CryptoError::KeyRequired.into());
            }
            // Neither an archive nor an envelope: the codec reports the signature
            None => (raw, false),
        }
    };

    let compressor = match max_entry_size {
        Some(limit) => Zstd::default().with_max_output(limit),
        None => Zstd::default(),
    };
    let archive = decode(&plaintext, &compressor)?;
    if archive.header.encrypted != sealed {
        return Err(CryptoError::EncryptionFlagMismatch {
            header_flag: archive.header.encrypted,
            sealed,
        }
        .into());
    }
    Ok(archive)
}

/// Reject entry paths that could land outside the extraction root.
///
/// Accepted paths are '/'-separated, relative, and made only of normal
/// components: no empty, `.` or `..` segments, no backslashes, no NULs.
pub fn check_entry_path(path: &str) -> Result<(), FormatError> {
    let unsafe_path = || FormatError::UnsafePath {
        path: path.to_string(),
    };

    if path.is_empty() || path.starts_with('/') || path.contains(['\\', '\0']) {
        return Err(unsafe_path());
    }
    for segment in path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(unsafe_path());
        }
        // Drive prefixes such as `C:` on Windows
        if cfg!(windows) && segment.contains(':') {
            return Err(unsafe_path());
        }
    }
    Ok(())
}
