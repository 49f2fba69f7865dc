//! This library handles reading from and creating **TAB/ARC** archive pairs used by *Avalanche
//! engine* games (*Just Cause 3*, *Just Cause 4*).
//!
//! # Archive Pair Format Documentation
//!
//! Game data is split over many archive pairs. The `.arc` data file is nothing more than payloads
//! stored back to back, the `.tab` index next to it tells where each asset lives. Assets are not
//! named inside the pair, they are addressed by the [`hash::hashlittle`] hash of their generic path.
//!
//! ## Index Header
//!
//! Two header layouts exist. Which one a file uses is not recorded in the file itself, it follows
//! from the game generation, see [`TableFormat`].
//!
//! | Offset (bytes) | Field                  | Description                                              |
//! |----------------|------------------------|----------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: 0x00424154 ("TAB\0")                            |
//! | 0x0004         | Version                | 2 bytes: 2                                               |
//! | 0x0006         | Endian                 | 2 bytes: 1                                               |
//! | 0x0008         | Alignment              | 4 bytes: payload alignment inside the data file          |
//! | 0x000C         | Unknown                | 4 bytes: current layout only                             |
//! | 0x0010         | Max Compressed Block   | 4 bytes: current layout only                             |
//! | 0x0014         | Uncompressed Block     | 4 bytes: current layout only                             |
//!
//! ### Block Table
//!
//! Current layout indices follow the header with a `u32` block count and that many 8 byte
//! `{compressed_size, uncompressed_size}` pairs. Large payloads are compressed in independent
//! blocks, an entry names its first block and the blocks are consumed in order until the entry's
//! compressed size is reached. A block whose two sizes are equal is stored uncompressed.
//!
//! ### Entries
//!
//! The rest of the file is a flat list of entries, read until less than a whole entry remains.
//!
//! Legacy entries (12 bytes):
//!
//! | Offset (bytes) | Field                  | Description                                              |
//! |----------------|------------------------|----------------------------------------------------------|
//! | 0x0000         | Hash                   | 4 bytes: `hashlittle` of the generic path                |
//! | 0x0004         | Offset                 | 4 bytes: payload offset inside the data file             |
//! | 0x0008         | Size                   | 4 bytes: payload size, never compressed                  |
//!
//! Current entries (20 bytes):
//!
//! | Offset (bytes) | Field                  | Description                                              |
//! |----------------|------------------------|----------------------------------------------------------|
//! | 0x0000         | Hash                   | 4 bytes: `hashlittle` of the generic path                |
//! | 0x0004         | Offset                 | 4 bytes: payload offset inside the data file             |
//! | 0x0008         | Compressed Size        | 4 bytes: bytes occupied in the data file                 |
//! | 0x000C         | Uncompressed Size      | 4 bytes: size after decoding                             |
//! | 0x0010         | Block Index            | 2 bytes: first block, `0` for a contiguous stream        |
//! | 0x0012         | Compression            | 1 byte: see [`CompressionKind`]                          |
//! | 0x0013         | Flags                  | 1 byte                                                   |
//!
//! ## Additional Information
//!
//! - **File Extensions**: `.tab`, `.arc`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Compression Methods**:
//!   - `0`: None
//!   - `1`: Zlib
//!   - `4`: proprietary LZ, needs an external [`compression::LzDecompressor`]
//!

pub mod compression;
pub mod error;
pub mod hash;
pub mod pair;
pub mod read;
pub mod types;
pub mod write;

pub use compression::{Codec, CompressionKind};
pub use hash::{hash_path, hashlittle};
pub use pair::ArchivePair;
pub use read::ArchiveTable;
pub use types::{TableEntry, TableFormat};
pub use write::ArchivePairWriter;
