//! Volume header structure and field encoding

use binrw::{BinRead, BinWrite};
use std::fmt;

use crate::catalog::CATALOG_ENTRY_SIZE;
use crate::error::{VdfsError, VdfsResult};
use crate::timestamp::DosTimestamp;

/// Width of the comment field
pub const COMMENT_SIZE: usize = 256;

/// Width of the signature field
pub const SIGNATURE_SIZE: usize = 16;

/// Serialized header size; the catalog starts right after it
pub const HEADER_SIZE: usize = COMMENT_SIZE + SIGNATURE_SIZE + 6 * 4;

/// Filler for unused comment bytes (DOS end-of-file marker)
pub const COMMENT_PAD: u8 = 0x1A;

/// Volume signature variant
///
/// Both engine generations accept volumes whose signature matches their own
/// line-ending order; Gothic II is the common target for mods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Signature {
    /// `PSVDSC_V2.00\r\n\r\n`
    Gothic1,
    /// `PSVDSC_V2.00\n\r\n\r`
    #[default]
    Gothic2,
}

impl Signature {
    /// Raw signature bytes
    pub const fn bytes(self) -> [u8; SIGNATURE_SIZE] {
        match self {
            Self::Gothic1 => *b"PSVDSC_V2.00\r\n\r\n",
            Self::Gothic2 => *b"PSVDSC_V2.00\n\r\n\r",
        }
    }

    /// Identify a signature from its raw bytes
    pub fn from_bytes(bytes: &[u8; SIGNATURE_SIZE]) -> Option<Self> {
        [Self::Gothic1, Self::Gothic2]
            .into_iter()
            .find(|sig| &sig.bytes() == bytes)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gothic1 => f.write_str("gothic1"),
            Self::Gothic2 => f.write_str("gothic2"),
        }
    }
}

/// Encode comment text into the fixed field
///
/// Text longer than the field is cut at the last character boundary that
/// fits; the remainder is filled with [`COMMENT_PAD`].
pub fn encode_comment(comment: &str) -> [u8; COMMENT_SIZE] {
    let mut field = [COMMENT_PAD; COMMENT_SIZE];

    let mut end = comment.len().min(COMMENT_SIZE);
    while !comment.is_char_boundary(end) {
        end -= 1;
    }
    field[..end].copy_from_slice(&comment.as_bytes()[..end]);

    field
}

/// Decode the comment field, dropping padding
pub fn decode_comment(field: &[u8; COMMENT_SIZE]) -> String {
    let end = field
        .iter()
        .rposition(|&b| b != COMMENT_PAD && b != 0)
        .map_or(0, |i| i + 1);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// VDFS volume header (296 bytes, little-endian)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct VdfsHeader {
    /// Free text, padded with 0x1A
    pub comment: [u8; COMMENT_SIZE],

    /// Volume signature
    pub signature: [u8; SIGNATURE_SIZE],

    /// Total catalog records (directories and files)
    pub entry_count: u32,

    /// File records only
    pub file_count: u32,

    /// Build time as packed DOS date/time
    pub timestamp: u32,

    /// Size of the data region in bytes
    pub data_size: u32,

    /// Byte offset of the first catalog record
    pub catalog_offset: u32,

    /// Size of one catalog record
    pub entry_size: u32,
}

impl VdfsHeader {
    /// Create a header with empty counts
    pub fn new(comment: &str, signature: Signature, timestamp: DosTimestamp) -> Self {
        Self {
            comment: encode_comment(comment),
            signature: signature.bytes(),
            entry_count: 0,
            file_count: 0,
            timestamp: timestamp.raw(),
            data_size: 0,
            catalog_offset: HEADER_SIZE as u32,
            entry_size: CATALOG_ENTRY_SIZE as u32,
        }
    }

    /// Fill in catalog and data region totals
    pub fn update_totals(&mut self, entry_count: u32, file_count: u32, data_size: u32) {
        self.entry_count = entry_count;
        self.file_count = file_count;
        self.data_size = data_size;
    }

    /// Comment text without padding
    pub fn comment_text(&self) -> String {
        decode_comment(&self.comment)
    }

    /// Known signature variant, if any
    pub fn signature_kind(&self) -> Option<Signature> {
        Signature::from_bytes(&self.signature)
    }

    /// Packed build time
    pub fn timestamp(&self) -> DosTimestamp {
        DosTimestamp::from_raw(self.timestamp)
    }

    /// Byte offset where file data begins
    pub fn data_offset(&self) -> u64 {
        u64::from(self.catalog_offset) + u64::from(self.entry_count) * u64::from(self.entry_size)
    }

    /// Validate fields a reader depends on
    pub fn validate(&self) -> VdfsResult<()> {
        if self.signature_kind().is_none() {
            return Err(VdfsError::MalformedArchive(format!(
                "unknown signature {:02x?}",
                self.signature
            )));
        }

        if self.entry_size as usize != CATALOG_ENTRY_SIZE {
            return Err(VdfsError::MalformedArchive(format!(
                "catalog entry size {} (expected {CATALOG_ENTRY_SIZE})",
                self.entry_size
            )));
        }

        if (self.catalog_offset as usize) < HEADER_SIZE {
            return Err(VdfsError::MalformedArchive(format!(
                "catalog offset {} overlaps the header",
                self.catalog_offset
            )));
        }

        if self.file_count > self.entry_count {
            return Err(VdfsError::MalformedArchive(format!(
                "file count {} exceeds entry count {}",
                self.file_count, self.entry_count
            )));
        }

        Ok(())
    }
}

impl fmt::Display for VdfsHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Comment: {}", self.comment_text())?;
        match self.signature_kind() {
            Some(sig) => writeln!(f, "Signature: {sig}")?,
            None => writeln!(f, "Signature: unknown")?,
        }
        writeln!(f, "Entries: {}", self.entry_count)?;
        writeln!(f, "Files: {}", self.file_count)?;
        match self.timestamp().to_datetime() {
            Some(time) => writeln!(f, "Timestamp: {}", time.format("%Y-%m-%d %H:%M:%S"))?,
            None => writeln!(f, "Timestamp: 0x{:08X}", self.timestamp)?,
        }
        writeln!(f, "Data size: {}", self.data_size)?;
        write!(f, "Catalog offset: {}", self.catalog_offset)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::BinWriterExt;
    use std::io::Cursor;

    #[test]
    fn test_header_size_constant() {
        assert_eq!(HEADER_SIZE, 296);

        let header = VdfsHeader::new("", Signature::Gothic2, DosTimestamp::from_raw(0));
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_le(&header).expect("Operation should succeed");
        assert_eq!(cursor.into_inner().len(), HEADER_SIZE);
    }

    #[test]
    fn test_header_field_layout() {
        let mut header = VdfsHeader::new("hi", Signature::Gothic2, DosTimestamp::from_raw(0xAABBCCDD));
        header.update_totals(4, 3, 5);

        let mut cursor = Cursor::new(Vec::new());
        header.write_le(&mut cursor).expect("Operation should succeed");
        let bytes = cursor.into_inner();

        assert_eq!(&bytes[..2], b"hi");
        assert!(bytes[2..256].iter().all(|&b| b == COMMENT_PAD));
        assert_eq!(&bytes[256..272], b"PSVDSC_V2.00\n\r\n\r");
        assert_eq!(&bytes[272..276], &4u32.to_le_bytes());
        assert_eq!(&bytes[276..280], &3u32.to_le_bytes());
        assert_eq!(&bytes[280..284], &0xAABBCCDDu32.to_le_bytes());
        assert_eq!(&bytes[284..288], &5u32.to_le_bytes());
        assert_eq!(&bytes[288..292], &296u32.to_le_bytes());
        assert_eq!(&bytes[292..296], &80u32.to_le_bytes());
    }

    #[test]
    fn test_comment_truncated_on_char_boundary() {
        // 255 ASCII bytes followed by a two-byte character
        let comment = format!("{}é", "x".repeat(255));
        let field = encode_comment(&comment);
        assert!(field[..255].iter().all(|&b| b == b'x'));
        assert_eq!(field[255], COMMENT_PAD);
        assert_eq!(decode_comment(&field), "x".repeat(255));
    }

    #[test]
    fn test_comment_exact_width() {
        let comment = "c".repeat(COMMENT_SIZE + 10);
        let field = encode_comment(&comment);
        assert_eq!(field, [b'c'; COMMENT_SIZE]);
    }

    #[test]
    fn test_signature_lookup() {
        assert_eq!(
            Signature::from_bytes(b"PSVDSC_V2.00\r\n\r\n"),
            Some(Signature::Gothic1)
        );
        assert_eq!(Signature::from_bytes(&[0u8; SIGNATURE_SIZE]), None);
    }

    #[test]
    fn test_validate_rejects_bad_entry_size() {
        let mut header = VdfsHeader::new("", Signature::Gothic1, DosTimestamp::from_raw(0));
        header.entry_size = 64;
        assert!(matches!(
            header.validate(),
            Err(VdfsError::MalformedArchive(_))
        ));
    }
}
