use packd_core::FormatError;

/// Archive identity marker: `<!PAKD!>`
pub const MARKER: [u8; 8] = *b"<!PAKD!>";
pub const MARKER_LEN: usize = MARKER.len();

/// Archive header: encryption flag + 7 reserved bytes
pub const ARCHIVE_HEADER_LEN: usize = 8;

/// Box header: u16 path length + u64 data length
pub const BOX_HEADER_LEN: usize = 2 + 8;

const FLAG_PLAIN: u8 = 0x00;
const FLAG_ENCRYPTED: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchiveHeader {
    pub encrypted: bool,
}

impl ArchiveHeader {
    pub fn to_bytes(self) -> [u8; ARCHIVE_HEADER_LEN] {
        let mut out = [0u8; ARCHIVE_HEADER_LEN];
        out[0] = if self.encrypted { FLAG_ENCRYPTED } else { FLAG_PLAIN };
        out
    }

    /// Reserved bytes are ignored. Any non-zero flag byte counts as encrypted.
    pub fn parse(bytes: &[u8; ARCHIVE_HEADER_LEN]) -> Self {
        Self {
            encrypted: bytes[0] != FLAG_PLAIN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    pub path_len: u16,
    pub data_len: u64,
}

impl BoxHeader {
    /// Header for `path`, failing if it does not fit in a u16 length.
    pub fn for_entry(path: &str, data_len: usize) -> Result<Self, FormatError> {
        let path_len = u16::try_from(path.len()).map_err(|_| FormatError::PathTooLong {
            path: path.to_string(),
            len: path.len(),
        })?;
        Ok(Self {
            path_len,
            data_len: data_len as u64,
        })
    }

    pub fn to_bytes(self) -> [u8; BOX_HEADER_LEN] {
        let mut out = [0u8; BOX_HEADER_LEN];
        out[..2].copy_from_slice(&self.path_len.to_le_bytes());
        out[2..].copy_from_slice(&self.data_len.to_le_bytes());
        out
    }

    pub fn parse(bytes: &[u8; BOX_HEADER_LEN]) -> Self {
        Self {
            path_len: u16::from_le_bytes([bytes[0], bytes[1]]),
            data_len: u64::from_le_bytes([
                bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7], bytes[8], bytes[9],
            ]),
        }
    }

    /// Bytes following the header: path plus compressed data.
    pub fn body_len(&self) -> u64 {
        (self.path_len as u64).saturating_add(self.data_len)
    }
}

/// True if `bytes` begins with the archive marker.
pub fn has_marker(bytes: &[u8]) -> bool {
    bytes.starts_with(&MARKER)
}
