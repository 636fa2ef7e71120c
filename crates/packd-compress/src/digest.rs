//! BLAKE3 content digests for archived entries

/// A BLAKE3 hash digest (32 bytes), displayed as 64 hex chars
pub type Hash = blake3::Hash;

/// Hash a byte slice in memory.
pub fn digest(data: &[u8]) -> Hash {
    blake3::hash(data)
}

/// Hash a byte slice and format it as lowercase hex (64 chars).
pub fn digest_hex(data: &[u8]) -> String {
    digest(data).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_deterministic() {
        assert_eq!(digest(b"packd"), digest(b"packd"));
        assert_ne!(digest(b"packd"), digest(b"pakd"));
    }

    #[test]
    fn test_digest_hex_length() {
        let hex = digest_hex(b"");
        assert_eq!(hex.len(), 64);
        // BLAKE3 of the empty input
        assert!(hex.starts_with("af1349b9"));
    }
}
