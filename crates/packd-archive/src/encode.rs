//! Encode: files → `<!PAKD!>` byte stream
//!
//! The encoder only records the encryption flag; sealing the stream is the
//! writer's job. Boxes are emitted in the order given, which for `encode_dir`
//! is the walker's sorted order. With more than one worker, entries are read
//! and compressed on a rayon pool and collected back in input order before
//! any box is written.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use packd_compress::Compressor;
use packd_core::{FileEntry, FormatError, PackdError, PackdResult};
use rayon::prelude::*;

use crate::format::{
    ArchiveHeader, BoxHeader, ARCHIVE_HEADER_LEN, BOX_HEADER_LEN, MARKER, MARKER_LEN,
};
use crate::walk::{walk, SourceFile, WalkOptions};

/// Settings for `encode_dir`.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Value written to the header's encryption flag
    pub encrypted: bool,
    /// Compression worker threads (0 = cpu_count, 1 = sequential)
    pub workers: usize,
    pub walk: WalkOptions,
    /// Checked between entries; when set the encode fails with `Cancelled`
    pub cancel: Option<Arc<AtomicBool>>,
}

/// Result of `encode_dir`
#[derive(Debug)]
pub struct EncodedArchive {
    pub bytes: Vec<u8>,
    pub entries: usize,
    /// Sum of uncompressed file sizes
    pub raw_bytes: u64,
}

struct CompressedBox {
    path: String,
    data: Vec<u8>,
    raw_len: u64,
}

/// Encode in-memory entries, compressing each one independently.
pub fn encode_entries(
    entries: &[FileEntry],
    encrypted: bool,
    compressor: &dyn Compressor,
) -> PackdResult<Vec<u8>> {
    let mut boxes = Vec::with_capacity(entries.len());
    for entry in entries {
        // Fail on an oversized path before spending time compressing
        BoxHeader::for_entry(&entry.path, 0)?;
        boxes.push(compress_entry(entry, compressor)?);
    }
    Ok(assemble(&boxes, encrypted)?)
}

/// Walk `root`, read and compress every regular file, and encode the archive.
pub fn encode_dir(
    root: &Path,
    compressor: &dyn Compressor,
    options: &EncodeOptions,
) -> PackdResult<EncodedArchive> {
    let files = walk(root, &options.walk)?;
    for file in &files {
        BoxHeader::for_entry(&file.rel_path, 0)?;
    }

    let cancel = options.cancel.as_deref();
    let boxes = if options.workers == 1 {
        files
            .iter()
            .map(|file| read_and_compress(file, compressor, cancel))
            .collect::<PackdResult<Vec<_>>>()?
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .build()
            .map_err(|e| PackdError::Config(format!("building compression pool: {e}")))?;
        pool.install(|| {
            files
                .par_iter()
                .map(|file| read_and_compress(file, compressor, cancel))
                .collect::<PackdResult<Vec<_>>>()
        })?
    };

    let raw_bytes = boxes.iter().map(|b| b.raw_len).sum();
    let bytes = assemble(&boxes, options.encrypted)?;
    Ok(EncodedArchive {
        bytes,
        entries: boxes.len(),
        raw_bytes,
    })
}

fn read_and_compress(
    file: &SourceFile,
    compressor: &dyn Compressor,
    cancel: Option<&AtomicBool>,
) -> PackdResult<CompressedBox> {
    if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
        return Err(PackdError::Cancelled);
    }
    let entry = file.read()?;
    compress_entry(&entry, compressor)
}

fn compress_entry(entry: &FileEntry, compressor: &dyn Compressor) -> PackdResult<CompressedBox> {
    let data = compressor
        .compress(&entry.contents)
        .map_err(|source| PackdError::Compression {
            path: entry.path.clone(),
            source,
        })?;
    Ok(CompressedBox {
        path: entry.path.clone(),
        data,
        raw_len: entry.contents.len() as u64,
    })
}

/// Marker + header + boxes, in order.
fn assemble(boxes: &[CompressedBox], encrypted: bool) -> Result<Vec<u8>, FormatError> {
    let body: usize = boxes
        .iter()
        .map(|b| BOX_HEADER_LEN + b.path.len() + b.data.len())
        .sum();
    let mut out = Vec::with_capacity(MARKER_LEN + ARCHIVE_HEADER_LEN + body);

    out.extend_from_slice(&MARKER);
    out.extend_from_slice(&ArchiveHeader { encrypted }.to_bytes());

    for b in boxes {
        let header = BoxHeader::for_entry(&b.path, b.data.len())?;
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(b.path.as_bytes());
        out.extend_from_slice(&b.data);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use packd_compress::Zstd;
    use tempfile::TempDir;

    #[test]
    fn test_empty_archive_is_16_bytes() {
        let bytes = encode_entries(&[], false, &Zstd::new(3)).unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..8], b"<!PAKD!>");
        assert_eq!(&bytes[8..], &[0u8; 8]);
    }

    #[test]
    fn test_encrypted_flag_recorded() {
        let bytes = encode_entries(&[], true, &Zstd::new(3)).unwrap();
        assert_eq!(bytes[8], 0x01);
        assert!(bytes[9..16].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_box_layout() {
        let z = Zstd::new(3);
        let entry = FileEntry::new("dir/hello.txt", b"hello hello hello".to_vec());
        let bytes = encode_entries(std::slice::from_ref(&entry), false, &z).unwrap();

        let expected_data = z.compress(&entry.contents).unwrap();
        let header = BoxHeader::parse(bytes[16..26].try_into().unwrap());
        assert_eq!(header.path_len as usize, "dir/hello.txt".len());
        assert_eq!(header.data_len as usize, expected_data.len(), "stores compressed size");
        assert_eq!(&bytes[26..39], b"dir/hello.txt");
        assert_eq!(&bytes[39..], expected_data.as_slice());
    }

    #[test]
    fn test_empty_file_gets_nonempty_frame() {
        let bytes = encode_entries(&[FileEntry::new("empty", Vec::new())], false, &Zstd::new(3))
            .unwrap();
        let header = BoxHeader::parse(bytes[16..26].try_into().unwrap());
        assert!(header.data_len > 0);
    }

    #[test]
    fn test_path_too_long_rejected() {
        let path = "p".repeat(70_000);
        let err = encode_entries(&[FileEntry::new(path, b"x".to_vec())], false, &Zstd::new(3))
            .unwrap_err();
        assert!(matches!(
            err,
            PackdError::Format(FormatError::PathTooLong { len: 70_000, .. })
        ));
    }

    #[test]
    fn test_encode_dir_parallel_matches_sequential() {
        let tmp = TempDir::new().unwrap();
        for i in 0..40 {
            let rel = format!("d{}/file{:02}.txt", i % 4, i);
            let path = tmp.path().join(&rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, rel.repeat(i + 1)).unwrap();
        }
        let z = Zstd::new(3);

        let sequential = encode_dir(
            tmp.path(),
            &z,
            &EncodeOptions {
                workers: 1,
                ..Default::default()
            },
        )
        .unwrap();
        let parallel = encode_dir(
            tmp.path(),
            &z,
            &EncodeOptions {
                workers: 4,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(sequential.entries, 40);
        assert_eq!(sequential.bytes, parallel.bytes, "box order must not depend on workers");
        assert_eq!(sequential.raw_bytes, parallel.raw_bytes);
    }

    #[test]
    fn test_encode_dir_cancelled() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"a").unwrap();

        let options = EncodeOptions {
            workers: 1,
            cancel: Some(Arc::new(AtomicBool::new(true))),
            ..Default::default()
        };
        let err = encode_dir(tmp.path(), &Zstd::new(3), &options).unwrap_err();
        assert!(matches!(err, PackdError::Cancelled));
    }

    #[test]
    fn test_encode_dir_deterministic() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b"), b"bbbb").unwrap();
        std::fs::write(tmp.path().join("a"), b"aaaa").unwrap();
        let z = Zstd::new(3);

        let first = encode_dir(tmp.path(), &z, &EncodeOptions::default()).unwrap();
        let second = encode_dir(tmp.path(), &z, &EncodeOptions::default()).unwrap();
        assert_eq!(first.bytes, second.bytes);
        // "a" sorts first: its box path sits right after the first box header
        assert_eq!(first.bytes[26], b'a');
    }
}
