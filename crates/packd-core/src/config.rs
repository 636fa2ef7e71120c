use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PackdError, PackdResult};

/// Lowest and highest zstd levels accepted by `ArchiveConfig::level()`
pub const MIN_COMPRESSION_LEVEL: i32 = 1;
pub const MAX_COMPRESSION_LEVEL: i32 = 22;

/// Default cap on a single decompressed entry: 1 GiB
pub const DEFAULT_MAX_ENTRY_SIZE: u64 = 1 << 30;

/// Top-level configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackdConfig {
    pub archive: ArchiveConfig,
    pub keys: KeysConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// zstd compression level (default: 11)
    pub compression_level: i32,
    /// Compression worker threads (0 = cpu_count, 1 = sequential)
    pub workers: usize,
    /// Glob patterns matched against file/directory names to leave out
    pub exclude_patterns: Vec<String>,
    /// Largest decompressed entry accepted when reading (0 = unlimited)
    pub max_entry_size: u64,
}

impl ArchiveConfig {
    /// Compression level clamped into the range zstd accepts.
    pub fn level(&self) -> i32 {
        self.compression_level
            .clamp(MIN_COMPRESSION_LEVEL, MAX_COMPRESSION_LEVEL)
    }

    /// Entry size cap for readers, `None` when unlimited.
    pub fn entry_limit(&self) -> Option<u64> {
        (self.max_entry_size > 0).then_some(self.max_entry_size)
    }
}

/// PEM key locations used when encrypting or decrypting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Recipient public key (PKCS#1 or SPKI PEM)
    pub public_key: Option<PathBuf>,
    /// Matching private key (PKCS#1 or PKCS#8 PEM)
    pub private_key: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: 11,
            workers: 0,
            exclude_patterns: Vec::new(),
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl PackdConfig {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> PackdResult<Self> {
        toml::from_str(content).map_err(|e| PackdError::Config(e.to_string()))
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> PackdResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| PackdError::io(path, e))?;
        Self::from_toml(&content)
            .map_err(|e| PackdError::Config(format!("parsing {}: {e}", path.display())))
    }
}

/// Expand `~` in path to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(home).join(rest)
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[archive]
compression_level = 3
workers = 4
exclude_patterns = ["*.tmp", ".git"]
max_entry_size = 1048576

[keys]
public_key = "/etc/packd/recipient.pub.pem"
private_key = "/etc/packd/recipient.pem"

[log]
level = "debug"
format = "json"
"#;
        let config = PackdConfig::from_toml(toml_str).unwrap();

        assert_eq!(config.archive.compression_level, 3);
        assert_eq!(config.archive.workers, 4);
        assert_eq!(config.archive.exclude_patterns, vec!["*.tmp", ".git"]);
        assert_eq!(config.archive.entry_limit(), Some(1024 * 1024));
        assert_eq!(
            config.keys.public_key,
            Some(PathBuf::from("/etc/packd/recipient.pub.pem"))
        );
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config = PackdConfig::from_toml("").unwrap();

        assert_eq!(config.archive.compression_level, 11);
        assert_eq!(config.archive.workers, 0);
        assert!(config.archive.exclude_patterns.is_empty());
        assert_eq!(config.archive.entry_limit(), Some(DEFAULT_MAX_ENTRY_SIZE));
        assert!(config.keys.public_key.is_none());
        assert!(config.keys.private_key.is_none());
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "text");
    }

    #[test]
    fn test_level_is_clamped() {
        let mut archive = ArchiveConfig::default();
        archive.compression_level = 99;
        assert_eq!(archive.level(), MAX_COMPRESSION_LEVEL);
        archive.compression_level = -5;
        assert_eq!(archive.level(), MIN_COMPRESSION_LEVEL);
    }

    #[test]
    fn test_zero_entry_size_is_unlimited() {
        let config = PackdConfig::from_toml("[archive]\nmax_entry_size = 0").unwrap();
        assert_eq!(config.archive.entry_limit(), None);
    }

    #[test]
    fn test_malformed_config_is_error() {
        let err = PackdConfig::from_toml("[archive]\nworkers = \"many\"").unwrap_err();
        assert!(matches!(err, PackdError::Config(_)));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = PackdConfig::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.archive.compression_level, 11);
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[archive]\nworkers = 2\n").unwrap();
        let config = PackdConfig::load(&path).unwrap();
        assert_eq!(config.archive.workers, 2);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = PackdConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = PackdConfig::from_toml(&toml_str).unwrap();

        assert_eq!(config.archive.compression_level, parsed.archive.compression_level);
        assert_eq!(config.log.format, parsed.log.format);
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde(Path::new("~/.config/packd/config.toml"));
        assert!(!expanded.to_string_lossy().starts_with("~/"));
        assert_eq!(expand_tilde(Path::new("/abs/path")), PathBuf::from("/abs/path"));
    }
}
