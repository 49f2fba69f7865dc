//! Base types for structure of TAB index files.

use binrw::{BinRead, BinWrite};

use crate::compression::CompressionKind;

/// `TAB\0` read as a little endian `u32`
pub const TAB_MAGIC: u32 = 0x0042_4154;

/// Layout generation of a TAB index
///
/// The legacy layout is used by Just Cause 3, the current layout (with compression metadata and a
/// block table) by Just Cause 4 and later.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum TableFormat {
    /// 12 byte header, 12 byte entries, all stored uncompressed
    Legacy,

    /// 24 byte header, block table, 20 byte entries
    #[default]
    Current,
}

impl TableFormat {
    /// Size in bytes of one index entry
    pub const fn entry_size(self) -> u64 {
        match self {
            TableFormat::Legacy => 12,
            TableFormat::Current => 20,
        }
    }
}

/// Legacy TAB header
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"TAB\0", little)]
pub struct LegacyTabHeader {
    pub version: u16,
    pub endian: u16,
    /// Alignment of payloads inside the data file
    pub alignment: i32,
}

impl Default for LegacyTabHeader {
    fn default() -> Self {
        Self {
            version: 2,
            endian: 1,
            alignment: 0,
        }
    }
}

/// Current TAB header
///
/// Followed by a `u32` block count and that many [`CompressedBlock`]s.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"TAB\0", little)]
pub struct CurrentTabHeader {
    pub version: u16,
    pub endian: u16,
    /// Alignment of payloads inside the data file
    pub alignment: i32,
    pub unknown: u32,
    /// Largest compressed block referenced by the block table
    pub max_compressed_block_size: u32,
    /// Size every block decompresses to, except the last block of an entry
    pub uncompressed_block_size: u32,
}

impl Default for CurrentTabHeader {
    fn default() -> Self {
        Self {
            version: 2,
            endian: 1,
            alignment: 0,
            unknown: 0,
            max_compressed_block_size: 0,
            uncompressed_block_size: 0,
        }
    }
}

/// Either header layout, remembered so an index can be written back unchanged
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TabHeader {
    Legacy(LegacyTabHeader),
    Current(CurrentTabHeader),
}

impl TabHeader {
    pub fn new(format: TableFormat) -> Self {
        match format {
            TableFormat::Legacy => TabHeader::Legacy(Default::default()),
            TableFormat::Current => TabHeader::Current(Default::default()),
        }
    }

    pub fn format(&self) -> TableFormat {
        match self {
            TabHeader::Legacy(_) => TableFormat::Legacy,
            TabHeader::Current(_) => TableFormat::Current,
        }
    }

    pub fn alignment(&self) -> i32 {
        match self {
            TabHeader::Legacy(h) => h.alignment,
            TabHeader::Current(h) => h.alignment,
        }
    }

    pub fn set_alignment(&mut self, alignment: i32) {
        match self {
            TabHeader::Legacy(h) => h.alignment = alignment,
            TabHeader::Current(h) => h.alignment = alignment,
        }
    }
}

/// Legacy index record
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct LegacyTabEntry {
    pub hash: u32,
    pub offset: u32,
    pub size: u32,
}

/// Current index record
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct CurrentTabEntry {
    pub hash: u32,
    pub offset: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    /// First block of the entry in the block table, `0` when the payload is contiguous
    pub compressed_block_index: u16,
    pub compression: CompressionKind,
    pub flags: u8,
}

/// One slice of a block compressed payload
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct CompressedBlock {
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

impl CompressedBlock {
    /// Blocks that did not shrink are stored verbatim
    pub fn is_stored(&self) -> bool {
        self.compressed_size == self.uncompressed_size
    }
}

/// Where and how a single asset is stored in the data file
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub content_hash: u32,
    pub offset: u64,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub compression: CompressionKind,
    /// `0` when the payload is one contiguous stream
    pub compressed_block_index: u32,
    pub flags: u8,
}

impl TableEntry {
    /// Whether the payload bytes can be returned without decoding
    pub fn is_stored(&self) -> bool {
        self.compression == CompressionKind::None || self.compressed_size == self.uncompressed_size
    }
}

impl From<LegacyTabEntry> for TableEntry {
    fn from(value: LegacyTabEntry) -> Self {
        Self {
            content_hash: value.hash,
            offset: value.offset as u64,
            compressed_size: value.size,
            uncompressed_size: value.size,
            ..Default::default()
        }
    }
}

impl From<CurrentTabEntry> for TableEntry {
    fn from(value: CurrentTabEntry) -> Self {
        Self {
            content_hash: value.hash,
            offset: value.offset as u64,
            compressed_size: value.compressed_size,
            uncompressed_size: value.uncompressed_size,
            compression: value.compression,
            compressed_block_index: value.compressed_block_index as u32,
            flags: value.flags,
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::BinRead;
    use binrw::BinWrite;
    use pretty_assertions::assert_eq;

    use crate::compression::CompressionKind;
    use crate::error::Result;
    use crate::types::{
        CompressedBlock, CurrentTabEntry, CurrentTabHeader, LegacyTabEntry, LegacyTabHeader,
        TableEntry,
    };

    #[test]
    fn read_legacy_header() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x54, 0x41, 0x42, 0x00,
            0x02, 0x00, 0x01, 0x00,
            0x00, 0x10, 0x00, 0x00,
        ]);

        let expected = LegacyTabHeader {
            alignment: 0x1000,
            ..Default::default()
        };

        assert_eq!(LegacyTabHeader::read(&mut input)?, expected);

        Ok(())
    }

    #[test]
    fn write_current_header() -> Result<()> {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x54, 0x41, 0x42, 0x00,
            0x02, 0x00, 0x01, 0x00,
            0x10, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x01, 0x00,
            0x00, 0x00, 0x01, 0x00,
        ];

        let header = CurrentTabHeader {
            alignment: 0x10,
            max_compressed_block_size: 0x10000,
            uncompressed_block_size: 0x10000,
            ..Default::default()
        };

        let mut actual = Vec::new();
        header.write(&mut Cursor::new(&mut actual))?;

        assert_eq!(actual, expected);

        Ok(())
    }

    #[test]
    fn read_legacy_entry() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x78, 0x56, 0x34, 0x12,
            0x00, 0x01, 0x00, 0x00,
            0x0B, 0x00, 0x00, 0x00,
        ]);

        let actual: TableEntry = LegacyTabEntry::read(&mut input)?.into();
        assert_eq!(
            actual,
            TableEntry {
                content_hash: 0x12345678,
                offset: 0x100,
                compressed_size: 11,
                uncompressed_size: 11,
                compression: CompressionKind::None,
                ..Default::default()
            }
        );

        Ok(())
    }

    #[test]
    fn read_current_entry() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0xEF, 0xBE, 0xAD, 0xDE,
            0x20, 0x00, 0x00, 0x00,
            0x13, 0x00, 0x00, 0x00,
            0x0B, 0x00, 0x00, 0x00,
            0x02, 0x00,
            0x01,
            0x00,
        ]);

        let expected = CurrentTabEntry {
            hash: 0xDEADBEEF,
            offset: 0x20,
            compressed_size: 19,
            uncompressed_size: 11,
            compressed_block_index: 2,
            compression: CompressionKind::Zlib,
            flags: 0,
        };

        assert_eq!(CurrentTabEntry::read(&mut input)?, expected);

        Ok(())
    }

    #[test]
    fn read_current_entry_unknown_compression() {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0xEF, 0xBE, 0xAD, 0xDE,
            0x20, 0x00, 0x00, 0x00,
            0x13, 0x00, 0x00, 0x00,
            0x0B, 0x00, 0x00, 0x00,
            0x00, 0x00,
            0x07,
            0x00,
        ]);

        assert!(CurrentTabEntry::read(&mut input).is_err());
    }

    #[test]
    fn write_block() -> Result<()> {
        let block = CompressedBlock {
            compressed_size: 0x800,
            uncompressed_size: 0x10000,
        };
        assert!(!block.is_stored());

        let mut actual = Vec::new();
        block.write(&mut Cursor::new(&mut actual))?;
        assert_eq!(actual, vec![0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00]);

        Ok(())
    }
}
