//! This library handles reading from and creating **SARC** stream archives and the **AAF**
//! containers they are shipped in, as used by *Avalanche engine* games.
//!
//! # AAF Container
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "AAF\0"                                        |
//! | 0x0004         | Version                | 4 bytes: 1                                              |
//! | 0x0008         | Tag                    | 28 bytes: "AVALANCHEARCHIVEFORMATISCOOL"                |
//! | 0x0024         | Total Uncompressed     | 4 bytes: size of the decoded payload                    |
//! | 0x0028         | Uncompressed Buffer    | 4 bytes: largest decoded chunk                          |
//! | 0x002C         | Chunk Count            | 4 bytes                                                 |
//!
//! Every chunk starts with a 16 byte header `{compressed_size, uncompressed_size, data_size,
//! magic = "EWAM"}` followed by a raw deflate stream. `data_size` is the distance to the next
//! chunk header and includes the `0x30` padding that keeps chunks 16 byte aligned.
//!
//! # SARC Stream Archive
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Magic Length           | 4 bytes: 4                                              |
//! | 0x0004         | Magic number           | 4 bytes: "SARC"                                         |
//! | 0x0008         | Version                | 4 bytes: 2 or 3                                         |
//! | 0x000C         | Region Size            | 4 bytes: size of the entry region that follows          |
//!
//! Version 2 entries are `{name_len, name, offset, size}` with names NUL padded to 4 bytes. Version
//! 3 regions hold a `u32` name pool length, the NUL separated names, then fixed 20 byte entries
//! `{name_offset, file_offset, size, name_hash, extension_hash}`.
//!
//! An entry with offset `0` (or `0xFFFFFFFF`) has no bytes in this archive, its data lives in a
//! patch. A `.toc` file next to the archive lists version 2 style entries with no header and
//! overrides the offsets and sizes of the archive it belongs to.
//!
//! ## Additional Information
//!
//! - **File Extensions**: `.ee`, `.bl`, `.nl`, `.fl`, `.toc`
//! - **Endianness**: Little-endian for all multi-byte integers
//!

pub mod aaf;
pub mod error;
pub mod read;
pub mod types;
pub mod write;

pub use read::{ArchiveEntry, FlatArchive, OverlayReport};
