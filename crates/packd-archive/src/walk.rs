//! Directory traversal: regular files under a root, as sorted relative paths
//!
//! Symlinks and special files are skipped with a warning. Output order is
//! byte-wise lexicographic on the normalised relative path, so the same tree
//! always encodes to the same box sequence.

use std::path::{Path, PathBuf};

use packd_core::{FileEntry, PackdError, PackdResult};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Which files the walker yields.
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Glob patterns matched against each file or directory name
    pub exclude_patterns: Vec<String>,
}

/// A regular file found under the walk root, not yet read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Root-relative, '/'-separated, no leading slash
    pub rel_path: String,
    pub abs_path: PathBuf,
}

impl SourceFile {
    /// Read the full contents into a `FileEntry`.
    pub fn read(&self) -> PackdResult<FileEntry> {
        let contents =
            std::fs::read(&self.abs_path).map_err(|e| PackdError::io(&self.abs_path, e))?;
        Ok(FileEntry::new(self.rel_path.clone(), contents))
    }
}

/// Enumerate regular files under `root`, sorted by relative path.
pub fn walk(root: &Path, options: &WalkOptions) -> PackdResult<Vec<SourceFile>> {
    if !root.is_dir() {
        return Err(PackdError::Config(format!(
            "input is not a directory: {}",
            root.display()
        )));
    }

    let excludes: Vec<glob::Pattern> = options
        .exclude_patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p)
                .map_err(|e| PackdError::Config(format!("invalid exclude pattern '{p}': {e}")))
        })
        .collect::<PackdResult<_>>()?;

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|ent| ent.depth() == 0 || !is_excluded(ent.file_name(), &excludes));

    for ent in walker {
        let ent = ent.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let msg = e.to_string();
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, msg));
            PackdError::io(path, io)
        })?;

        let file_type = ent.file_type();
        if file_type.is_dir() {
            continue;
        }
        if file_type.is_symlink() {
            warn!(path = %ent.path().display(), "skipping symlink");
            continue;
        }
        if !file_type.is_file() {
            warn!(path = %ent.path().display(), "skipping special file");
            continue;
        }

        let rel_path = normalize_rel_path(root, ent.path())?;
        files.push(SourceFile {
            rel_path,
            abs_path: ent.path().to_path_buf(),
        });
    }

    files.sort_by(|a, b| a.rel_path.as_bytes().cmp(b.rel_path.as_bytes()));
    debug!(root = %root.display(), files = files.len(), "walked directory");
    Ok(files)
}

/// Walk and read every file: the `(relative path, contents)` view of a tree.
pub fn read_tree(root: &Path, options: &WalkOptions) -> PackdResult<Vec<FileEntry>> {
    walk(root, options)?.iter().map(SourceFile::read).collect()
}

fn is_excluded(name: &std::ffi::OsStr, excludes: &[glob::Pattern]) -> bool {
    match name.to_str() {
        Some(name) => excludes.iter().any(|p| p.matches(name)),
        None => false,
    }
}

/// `root/a/b.txt` → `a/b.txt`
pub fn normalize_rel_path(root: &Path, file_path: &Path) -> PackdResult<String> {
    let rel = file_path.strip_prefix(root).map_err(|_| {
        PackdError::Config(format!(
            "{} is outside walk root {}",
            file_path.display(),
            root.display()
        ))
    })?;

    let mut parts = Vec::new();
    for comp in rel.components() {
        let part = comp
            .as_os_str()
            .to_str()
            .ok_or_else(|| PackdError::NonUtf8Path(file_path.to_path_buf()))?;
        parts.push(part);
    }

    let out = parts.join("/");
    if out.is_empty() {
        return Err(PackdError::Config(format!(
            "empty relative path for {}",
            file_path.display()
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn rel_paths(files: &[SourceFile]) -> Vec<&str> {
        files.iter().map(|f| f.rel_path.as_str()).collect()
    }

    #[test]
    fn test_walk_sorted_recursive() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.txt", b"b");
        touch(tmp.path(), "a/z.txt", b"z");
        touch(tmp.path(), "a/deep/x.bin", b"x");
        touch(tmp.path(), "A.txt", b"upper");
        std::fs::create_dir_all(tmp.path().join("empty_dir")).unwrap();

        let files = walk(tmp.path(), &WalkOptions::default()).unwrap();
        assert_eq!(
            rel_paths(&files),
            vec!["A.txt", "a/deep/x.bin", "a/z.txt", "b.txt"]
        );
    }

    #[test]
    fn test_walk_empty_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(walk(tmp.path(), &WalkOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_walk_excludes() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "keep.rs", b"1");
        touch(tmp.path(), "scratch.tmp", b"2");
        touch(tmp.path(), ".git/HEAD", b"3");
        touch(tmp.path(), "src/lib.rs", b"4");
        touch(tmp.path(), "src/old.tmp", b"5");

        let options = WalkOptions {
            exclude_patterns: vec!["*.tmp".into(), ".git".into()],
        };
        let files = walk(tmp.path(), &options).unwrap();
        assert_eq!(rel_paths(&files), vec!["keep.rs", "src/lib.rs"]);
    }

    #[test]
    fn test_walk_invalid_pattern() {
        let tmp = TempDir::new().unwrap();
        let options = WalkOptions {
            exclude_patterns: vec!["[".into()],
        };
        assert!(matches!(
            walk(tmp.path(), &options),
            Err(PackdError::Config(_))
        ));
    }

    #[test]
    fn test_walk_rejects_file_root() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "file.txt", b"x");
        let err = walk(&tmp.path().join("file.txt"), &WalkOptions::default()).unwrap_err();
        assert!(matches!(err, PackdError::Config(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_skips_symlinks() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "real.txt", b"real");
        std::os::unix::fs::symlink(tmp.path().join("real.txt"), tmp.path().join("link.txt"))
            .unwrap();

        let files = walk(tmp.path(), &WalkOptions::default()).unwrap();
        assert_eq!(rel_paths(&files), vec!["real.txt"]);
    }

    #[test]
    fn test_read_tree_contents() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "dir/data.bin", &[0, 1, 2, 3]);
        touch(tmp.path(), "empty", b"");

        let entries = read_tree(tmp.path(), &WalkOptions::default()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], FileEntry::new("dir/data.bin", vec![0, 1, 2, 3]));
        assert_eq!(entries[1], FileEntry::new("empty", Vec::new()));
    }

    #[test]
    fn test_normalize_rel_path() {
        let root = Path::new("/data/root");
        assert_eq!(
            normalize_rel_path(root, Path::new("/data/root/a/b/c.txt")).unwrap(),
            "a/b/c.txt"
        );
        assert!(normalize_rel_path(root, Path::new("/elsewhere/c.txt")).is_err());
        assert!(normalize_rel_path(root, root).is_err());
    }
}
