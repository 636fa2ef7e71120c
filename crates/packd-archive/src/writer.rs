//! Pack: directory → `.pakd` file
//!
//! Order of work: resolve the recipient key, walk and encode, seal if
//! requested, write the output. A key problem is reported before any file
//! under the input root is read. The archive is assembled in memory and the
//! output is written to a temporary file next to the destination and renamed
//! over it once complete, so a failed or cancelled pack never touches an
//! existing file at the output path.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use packd_compress::Zstd;
use packd_core::{PackdError, PackdResult};
use packd_crypto::RsaPublicKey;
use tracing::{debug, info, warn};

use crate::encode::{encode_dir, EncodeOptions};
use crate::walk::WalkOptions;

/// Where the recipient public key comes from.
#[derive(Debug, Clone)]
pub enum Recipient {
    /// PEM file (PKCS#1 or SPKI)
    Pem(PathBuf),
    Key(RsaPublicKey),
}

impl Recipient {
    fn resolve(&self) -> PackdResult<RsaPublicKey> {
        match self {
            Recipient::Pem(path) => Ok(packd_crypto::load_public_key(path)?),
            Recipient::Key(key) => Ok(key.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PackOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    /// zstd level (1..=22)
    pub compression_level: i32,
    /// 0 = one per cpu, 1 = sequential
    pub workers: usize,
    pub walk: WalkOptions,
    pub encrypt: bool,
    pub recipient: Option<Recipient>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl PackOptions {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            compression_level: packd_compress::DEFAULT_LEVEL,
            workers: 0,
            walk: WalkOptions::default(),
            encrypt: false,
            recipient: None,
            cancel: None,
        }
    }
}

/// Outcome of a successful `pack`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSummary {
    pub entries: usize,
    /// Sum of uncompressed file sizes
    pub raw_bytes: u64,
    /// Size of the file written to disk
    pub archive_bytes: u64,
    pub encrypted: bool,
}

/// Pack `options.input` into `options.output`.
pub fn pack(options: &PackOptions) -> PackdResult<PackSummary> {
    let recipient = if options.encrypt {
        let source = options.recipient.as_ref().ok_or_else(|| {
            PackdError::Config("encryption requested but no public key was provided".into())
        })?;
        let key = source.resolve()?;
        packd_crypto::check_wrap_capacity(&key)?;
        Some(key)
    } else {
        if options.recipient.is_some() {
            debug!("public key supplied without encryption; ignoring it");
        }
        None
    };

    let compressor = Zstd::new(options.compression_level);
    let encode_options = EncodeOptions {
        encrypted: recipient.is_some(),
        workers: options.workers,
        walk: options.walk.clone(),
        cancel: options.cancel.clone(),
    };

    debug!(
        input = %options.input.display(),
        level = compressor.level(),
        workers = options.workers,
        encrypted = encode_options.encrypted,
        "packing"
    );
    let encoded = encode_dir(&options.input, &compressor, &encode_options)?;

    let bytes = match &recipient {
        Some(key) => packd_crypto::seal(&encoded.bytes, key)?,
        None => encoded.bytes,
    };

    write_output(&options.output, &bytes)?;

    let summary = PackSummary {
        entries: encoded.entries,
        raw_bytes: encoded.raw_bytes,
        archive_bytes: bytes.len() as u64,
        encrypted: recipient.is_some(),
    };
    info!(
        output = %options.output.display(),
        entries = summary.entries,
        raw_bytes = summary.raw_bytes,
        archive_bytes = summary.archive_bytes,
        encrypted = summary.encrypted,
        "archive written"
    );
    Ok(summary)
}

fn write_output(path: &Path, bytes: &[u8]) -> PackdResult<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent).map_err(|e| PackdError::io(parent, e))?;
            parent
        }
        None => Path::new("."),
    };

    // Dropping the temp file on an early return deletes it
    let mut staged = tempfile::Builder::new()
        .prefix(".pakd-")
        .suffix(".partial")
        .tempfile_in(dir)
        .map_err(|e| PackdError::io(dir, e))?;
    staged
        .write_all(bytes)
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|e| PackdError::io(staged.path(), e))?;

    staged.persist(path).map_err(|e| {
        warn!(path = %path.display(), "could not move archive into place");
        PackdError::io(path, e.error)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use packd_core::CryptoError;
    use std::sync::OnceLock;
    use tempfile::TempDir;

    fn test_key() -> &'static RsaPublicKey {
        static KEY: OnceLock<RsaPublicKey> = OnceLock::new();
        KEY.get_or_init(|| packd_crypto::generate_key_pair(2048).unwrap().1)
    }

    fn tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(tmp.path().join("src/main.rs"), b"fn main() {}\n").unwrap();
        std::fs::write(tmp.path().join("README"), b"readme ".repeat(50)).unwrap();
        tmp
    }

    #[test]
    fn test_pack_plain() {
        let src = tree();
        let out = TempDir::new().unwrap();
        let output = out.path().join("out.pakd");

        let summary = pack(&PackOptions::new(src.path(), &output)).unwrap();
        assert_eq!(summary.entries, 2);
        assert_eq!(summary.raw_bytes, 13 + 350);
        assert!(!summary.encrypted);

        let written = std::fs::read(&output).unwrap();
        assert_eq!(written.len() as u64, summary.archive_bytes);
        assert!(crate::format::has_marker(&written));
    }

    #[test]
    fn test_pack_encrypted_hides_marker() {
        let src = tree();
        let out = TempDir::new().unwrap();
        let output = out.path().join("sealed.pakd");

        let options = PackOptions {
            encrypt: true,
            recipient: Some(Recipient::Key(test_key().clone())),
            ..PackOptions::new(src.path(), &output)
        };
        let summary = pack(&options).unwrap();
        assert!(summary.encrypted);

        let written = std::fs::read(&output).unwrap();
        assert!(!crate::format::has_marker(&written));
        // 2048-bit key wraps to 256 bytes
        assert_eq!(&written[..4], &256u32.to_le_bytes());
    }

    #[test]
    fn test_encrypt_without_key_fails_before_reading() {
        let out = TempDir::new().unwrap();
        let output = out.path().join("never.pakd");
        let options = PackOptions {
            encrypt: true,
            ..PackOptions::new("/definitely/not/a/real/dir", &output)
        };

        let err = pack(&options).unwrap_err();
        assert!(matches!(err, PackdError::Config(_)), "got {err:?}");
        assert!(err.to_string().contains("no public key"));
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_key_file_is_key_load() {
        let src = tree();
        let out = TempDir::new().unwrap();
        let options = PackOptions {
            encrypt: true,
            recipient: Some(Recipient::Pem(out.path().join("missing.pub.pem"))),
            ..PackOptions::new(src.path(), out.path().join("x.pakd"))
        };

        let err = pack(&options).unwrap_err();
        assert!(matches!(
            err,
            PackdError::Crypto(CryptoError::KeyLoad { .. })
        ));
    }

    #[test]
    fn test_cancelled_pack_leaves_no_output() {
        let src = tree();
        let out = TempDir::new().unwrap();
        let output = out.path().join("cancelled.pakd");
        let options = PackOptions {
            cancel: Some(Arc::new(AtomicBool::new(true))),
            ..PackOptions::new(src.path(), &output)
        };

        assert!(matches!(pack(&options), Err(PackdError::Cancelled)));
        assert!(!output.exists());
    }

    fn leftover_partials(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .count()
    }

    #[test]
    fn test_cancelled_pack_keeps_existing_output() {
        let src = tree();
        let out = TempDir::new().unwrap();
        let output = out.path().join("existing.pakd");
        std::fs::write(&output, b"older archive").unwrap();
        let options = PackOptions {
            cancel: Some(Arc::new(AtomicBool::new(true))),
            ..PackOptions::new(src.path(), &output)
        };

        assert!(matches!(pack(&options), Err(PackdError::Cancelled)));
        assert_eq!(std::fs::read(&output).unwrap(), b"older archive");
    }

    #[test]
    fn test_unwritable_output_survives_failed_write() {
        let src = tree();
        let out = TempDir::new().unwrap();
        // A non-empty directory cannot be replaced by the finished archive
        let output = out.path().join("taken.pakd");
        std::fs::create_dir_all(&output).unwrap();
        std::fs::write(output.join("keep.txt"), b"keep me").unwrap();

        let err = pack(&PackOptions::new(src.path(), &output)).unwrap_err();
        assert!(matches!(err, PackdError::Io { .. }), "got {err:?}");
        assert_eq!(std::fs::read(output.join("keep.txt")).unwrap(), b"keep me");
        assert_eq!(leftover_partials(out.path()), 0);
    }

    #[test]
    fn test_pack_replaces_existing_output() {
        let src = tree();
        let out = TempDir::new().unwrap();
        let output = out.path().join("out.pakd");
        std::fs::write(&output, b"stale").unwrap();

        let summary = pack(&PackOptions::new(src.path(), &output)).unwrap();
        let written = std::fs::read(&output).unwrap();
        assert_eq!(written.len() as u64, summary.archive_bytes);
        assert!(crate::format::has_marker(&written));
        assert_eq!(leftover_partials(out.path()), 0);
    }

    #[test]
    fn test_output_parent_created() {
        let src = tree();
        let out = TempDir::new().unwrap();
        let output = out.path().join("nested/deeper/out.pakd");

        pack(&PackOptions::new(src.path(), &output)).unwrap();
        assert!(output.is_file());
    }
}
