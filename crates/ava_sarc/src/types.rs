//! Base types for structure of SARC archives and AAF containers.

use binrw::{BinRead, BinWrite};

/// `EWAM` read as a little endian `u32`
pub const CHUNK_MAGIC: u32 = 0x4D41_5745;

/// Tag written after the AAF version, not checked when reading
pub const AAF_TAG: [u8; 28] = *b"AVALANCHEARCHIVEFORMATISCOOL";

/// Size of [`AafHeader`] on disk
pub const AAF_HEADER_SIZE: u64 = 48;

/// Size of [`AafChunkHeader`] on disk
pub const CHUNK_HEADER_SIZE: u64 = 16;

/// Size of [`SarcHeader`] on disk
pub const SARC_HEADER_SIZE: u64 = 16;

/// AAF container header
///
/// Starts with "AAF\0", a version and the tag "AVALANCHEARCHIVEFORMATISCOOL".
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"AAF\0", little)]
pub struct AafHeader {
    pub version: u32,

    #[bw(map = |_: &[u8; 28]| AAF_TAG)]
    pub tag: [u8; 28],

    /// Size of the payload once every chunk is decoded
    pub total_uncompressed_size: u32,

    /// Largest uncompressed chunk
    pub uncompressed_buffer_size: u32,

    pub chunk_count: u32,
}

impl Default for AafHeader {
    fn default() -> Self {
        Self {
            version: 1,
            tag: AAF_TAG,
            total_uncompressed_size: 0,
            uncompressed_buffer_size: 0,
            chunk_count: 0,
        }
    }
}

/// Header in front of every AAF chunk
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct AafChunkHeader {
    /// Size of the raw deflate payload
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    /// Distance from the start of this header to the next one, padding included
    pub data_size: u32,
    pub magic: u32,
}

impl Default for AafChunkHeader {
    fn default() -> Self {
        Self {
            compressed_size: 0,
            uncompressed_size: 0,
            data_size: 0,
            magic: CHUNK_MAGIC,
        }
    }
}

/// SARC stream archive header
///
/// The magic is prefixed by its own length (always 4).
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"\x04\x00\x00\x00SARC", little)]
pub struct SarcHeader {
    /// `2` for the name-inline layout, `3` for the hashed name pool layout
    pub version: u32,

    /// Size of the entry region following this header
    pub region_size: u32,
}

impl Default for SarcHeader {
    fn default() -> Self {
        Self {
            version: 2,
            region_size: 0,
        }
    }
}

/// Fixed size entry of a version 3 archive
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct SarcV3Entry {
    /// Offset of the name inside the name pool
    pub name_offset: u32,
    pub file_offset: u32,
    pub size: u32,
    /// `hashlittle` of the full name
    pub name_hash: u32,
    pub extension_hash: u32,
}
