//! Decode: `<!PAKD!>` byte stream → entries
//!
//! Decoding is a single forward scan over an in-memory buffer. Every length
//! field is checked against the bytes that remain before anything is sliced
//! or allocated, so a corrupt header can never trigger an oversized
//! allocation or an out-of-bounds read. Running out of input exactly at a
//! box boundary ends the archive; running out anywhere else is `Truncated`.
//! Error offsets are absolute positions in the stream.

use packd_compress::Compressor;
use packd_core::FormatError;

use crate::format::{
    ArchiveHeader, BoxHeader, ARCHIVE_HEADER_LEN, BOX_HEADER_LEN, MARKER, MARKER_LEN,
};

/// One decoded box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEntry {
    pub path: String,
    pub contents: Vec<u8>,
    /// `data_len` as stored in the box
    pub compressed_size: u64,
    /// Offset of the box header in the stream
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct DecodedArchive {
    pub header: ArchiveHeader,
    pub entries: Vec<DecodedEntry>,
}

/// Decode a complete archive stream.
///
/// Stops at the first error; no partial entry list is returned.
pub fn decode(bytes: &[u8], compressor: &dyn Compressor) -> Result<DecodedArchive, FormatError> {
    let reader = BoxReader::new(bytes, compressor)?;
    let header = reader.header();
    let entries = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(DecodedArchive { header, entries })
}

/// Lazy box-by-box decoder. Yields at most one error, then stops.
pub struct BoxReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    header: ArchiveHeader,
    compressor: &'a dyn Compressor,
    done: bool,
}

impl<'a> BoxReader<'a> {
    /// Validate the marker and read the archive header.
    ///
    /// The marker is compared before anything else is looked at; a mismatch
    /// within the first 8 bytes is `InvalidSignature` even if the input is
    /// shorter than the full preamble.
    pub fn new(bytes: &'a [u8], compressor: &'a dyn Compressor) -> Result<Self, FormatError> {
        let seen = bytes.len().min(MARKER_LEN);
        if bytes[..seen] != MARKER[..seen] {
            return Err(FormatError::InvalidSignature {
                found: bytes[..seen].to_vec(),
            });
        }

        let mut reader = Self {
            bytes,
            pos: 0,
            header: ArchiveHeader::default(),
            compressor,
            done: false,
        };
        reader.take_bytes(MARKER_LEN as u64)?;
        reader.header = ArchiveHeader::parse(&reader.take_array::<ARCHIVE_HEADER_LEN>()?);
        Ok(reader)
    }

    pub fn header(&self) -> ArchiveHeader {
        self.header
    }

    /// Current read position in the stream.
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    fn remaining(&self) -> u64 {
        (self.bytes.len() - self.pos) as u64
    }

    fn take_bytes(&mut self, n: u64) -> Result<&'a [u8], FormatError> {
        let available = self.remaining();
        if n > available {
            return Err(FormatError::Truncated {
                offset: self.pos as u64,
                needed: n,
                available,
            });
        }
        let start = self.pos;
        self.pos += n as usize;
        Ok(&self.bytes[start..self.pos])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take_bytes(N as u64)?);
        Ok(out)
    }

    fn next_entry(&mut self) -> Result<Option<DecodedEntry>, FormatError> {
        if self.remaining() == 0 {
            return Ok(None);
        }

        let box_offset = self.pos as u64;
        let header = BoxHeader::parse(&self.take_array::<BOX_HEADER_LEN>()?);

        // Both length fields together must fit in what is left
        let available = self.remaining();
        if header.body_len() > available {
            return Err(FormatError::Truncated {
                offset: self.pos as u64,
                needed: header.body_len(),
                available,
            });
        }

        let path_offset = self.pos as u64;
        let path = std::str::from_utf8(self.take_bytes(header.path_len as u64)?)
            .map_err(|_| FormatError::InvalidPath {
                offset: path_offset,
            })?
            .to_string();

        let data = self.take_bytes(header.data_len)?;
        let contents =
            self.compressor
                .decompress(data)
                .map_err(|source| FormatError::CorruptEntry {
                    path: path.clone(),
                    offset: box_offset,
                    source,
                })?;

        Ok(Some(DecodedEntry {
            path,
            contents,
            compressed_size: header.data_len,
            offset: box_offset,
        }))
    }
}

impl Iterator for BoxReader<'_> {
    type Item = Result<DecodedEntry, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
