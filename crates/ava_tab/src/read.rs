//! Types for reading TAB indices and the payloads they describe
//!

use binrw::{BinRead, BinWrite};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use indexmap::IndexMap;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use tracing::{debug, instrument, trace, warn};

use crate::{
    compression::{decoded_capacity, Codec, CompressionKind},
    error::{CodecError, Error, Result},
    types::{
        CompressedBlock, CurrentTabEntry, CurrentTabHeader, LegacyTabEntry, LegacyTabHeader,
        TabHeader, TableEntry, TableFormat, TAB_MAGIC,
    },
};

/// A parsed TAB index
///
/// ```no_run
/// use std::fs::File;
/// use ava_tab::{ArchiveTable, Codec, TableFormat};
///
/// fn dump_first(hash: u32) -> ava_tab::error::Result<()> {
///     let table = ArchiveTable::parse(&std::fs::read("game0.tab")?, TableFormat::Current)?;
///     let bytes = table.read_entry(&mut File::open("game0.arc")?, hash, &Codec::new())?;
///     println!("{} bytes", bytes.len());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveTable {
    header: TabHeader,
    blocks: Vec<CompressedBlock>,
    entries: IndexMap<u32, TableEntry>,
}

impl ArchiveTable {
    /// An empty index of the given layout
    pub fn new(format: TableFormat) -> Self {
        Self {
            header: TabHeader::new(format),
            blocks: Vec::new(),
            entries: IndexMap::new(),
        }
    }

    /// Parse an in-memory index
    pub fn parse(bytes: &[u8], format: TableFormat) -> Result<Self> {
        Self::read(&mut Cursor::new(bytes), format)
    }

    /// Parse an index from the start of `reader`
    ///
    /// Entries are read until fewer than a whole entry remains, a trailing partial record is
    /// ignored.
    #[instrument(skip(reader), err)]
    pub fn read<R: Read + Seek>(reader: &mut R, format: TableFormat) -> Result<Self> {
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != TAB_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }
        reader.seek(SeekFrom::Start(0))?;

        let (header, blocks) = match format {
            TableFormat::Legacy => (TabHeader::Legacy(LegacyTabHeader::read(reader)?), Vec::new()),
            TableFormat::Current => {
                let header = CurrentTabHeader::read(reader)?;
                let count = reader.read_u32::<LittleEndian>()?;

                let available = end.saturating_sub(reader.stream_position()?) / 8;
                if count as u64 > available {
                    return Err(Error::CustomError(format!(
                        "block table claims {count} blocks but only {available} fit"
                    )));
                }

                let blocks = (0..count)
                    .map(|_| CompressedBlock::read(reader).map_err(Error::from))
                    .collect::<Result<Vec<_>>>()?;
                (TabHeader::Current(header), blocks)
            }
        };

        let mut entries = IndexMap::new();
        while end.saturating_sub(reader.stream_position()?) >= format.entry_size() {
            let entry: TableEntry = match format {
                TableFormat::Legacy => LegacyTabEntry::read(reader)?.into(),
                TableFormat::Current => CurrentTabEntry::read(reader)?.into(),
            };

            if entries.contains_key(&entry.content_hash) {
                warn!("duplicate hash {:#010x} in index", entry.content_hash);
                continue;
            }
            entries.insert(entry.content_hash, entry);
        }

        debug!(
            "parsed {:?} index with {} entries and {} blocks",
            format,
            entries.len(),
            blocks.len()
        );

        Ok(Self {
            header,
            blocks,
            entries,
        })
    }

    /// Serialise the index in the layout it was read or created with
    #[instrument(skip_all, err)]
    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        match &self.header {
            TabHeader::Legacy(header) => {
                header.write(writer)?;
                for entry in self.entries.values() {
                    LegacyTabEntry {
                        hash: entry.content_hash,
                        offset: narrow(entry.offset)?,
                        size: entry.uncompressed_size,
                    }
                    .write(writer)?;
                }
            }
            TabHeader::Current(header) => {
                header.write(writer)?;
                writer.write_u32::<LittleEndian>(self.blocks.len() as u32)?;
                for block in &self.blocks {
                    block.write(writer)?;
                }
                for entry in self.entries.values() {
                    CurrentTabEntry {
                        hash: entry.content_hash,
                        offset: narrow(entry.offset)?,
                        compressed_size: entry.compressed_size,
                        uncompressed_size: entry.uncompressed_size,
                        compressed_block_index: u16::try_from(entry.compressed_block_index)
                            .map_err(|_| {
                                Error::CustomError(format!(
                                    "block index {} does not fit the index layout",
                                    entry.compressed_block_index
                                ))
                            })?,
                        compression: entry.compression,
                        flags: entry.flags,
                    }
                    .write(writer)?;
                }
            }
        }
        Ok(())
    }

    /// Serialise the index into a new buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.write(&mut out)?;
        Ok(out.into_inner())
    }

    /// Layout of this index
    pub fn format(&self) -> TableFormat {
        self.header.format()
    }

    pub fn header(&self) -> &TabHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut TabHeader {
        &mut self.header
    }

    /// Number of entries in the index
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by content hash
    #[inline(always)]
    pub fn entry(&self, hash: u32) -> Option<&TableEntry> {
        self.entries.get(&hash)
    }

    /// Whether an entry with this hash exists
    pub fn contains(&self, hash: u32) -> bool {
        self.entries.contains_key(&hash)
    }

    /// Entries in file order
    pub fn entries(&self) -> impl Iterator<Item = &TableEntry> {
        self.entries.values()
    }

    /// The block table, empty for legacy indices
    pub fn blocks(&self) -> &[CompressedBlock] {
        &self.blocks
    }

    /// Add an entry, replacing an existing one with the same hash in place
    pub fn push_entry(&mut self, entry: TableEntry) {
        self.entries.insert(entry.content_hash, entry);
    }

    /// Append a block and return its index
    pub fn push_block(&mut self, block: CompressedBlock) -> u32 {
        self.blocks.push(block);
        (self.blocks.len() - 1) as u32
    }

    /// Split the index into its entries and block table
    pub fn into_parts(self) -> (Vec<TableEntry>, Vec<CompressedBlock>) {
        (self.entries.into_values().collect(), self.blocks)
    }

    /// Read and decode the payload for `hash` from the data file
    #[instrument(skip(self, reader, codec), fields(hash = format!("{hash:#010x}")), err)]
    pub fn read_entry<R: Read + Seek>(
        &self,
        reader: &mut R,
        hash: u32,
        codec: &Codec,
    ) -> Result<Bytes> {
        let entry = self.entry(hash).ok_or(Error::EntryNotFound(hash))?;
        self.read_entry_data(reader, entry, codec)
    }

    /// Read and decode the payload described by `entry`
    pub fn read_entry_data<R: Read + Seek>(
        &self,
        reader: &mut R,
        entry: &TableEntry,
        codec: &Codec,
    ) -> Result<Bytes> {
        reader.seek(SeekFrom::Start(entry.offset))?;

        if entry.is_stored() {
            trace!("reading {} stored bytes", entry.compressed_size);
            return Ok(read_span(reader, entry.compressed_size)?.into());
        }

        if entry.compressed_block_index == 0 {
            let data = read_span(reader, entry.compressed_size)?;
            return Ok(codec.decompress(
                entry.compression,
                &data,
                entry.uncompressed_size as usize,
            )?);
        }

        self.read_blocks(reader, entry, codec)
    }

    fn read_blocks<R: Read>(
        &self,
        reader: &mut R,
        entry: &TableEntry,
        codec: &Codec,
    ) -> Result<Bytes> {
        let mut output = Vec::with_capacity(decoded_capacity(
            entry.compressed_size as usize,
            entry.uncompressed_size as usize,
        ));
        let mut index = entry.compressed_block_index;
        let mut consumed: u64 = 0;

        while consumed < entry.compressed_size as u64 {
            let block = self
                .blocks
                .get(index as usize)
                .ok_or(Error::BlockOutOfRange {
                    index,
                    count: self.blocks.len(),
                })?;

            let data = read_span(reader, block.compressed_size)?;
            if block.is_stored() {
                output.extend_from_slice(&data);
            } else {
                let decoded = codec.decompress(
                    entry.compression,
                    &data,
                    block.uncompressed_size as usize,
                )?;
                output.extend_from_slice(&decoded);
            }

            consumed += block.compressed_size as u64;
            index += 1;
        }

        trace!(
            "read {} blocks starting at {}",
            index - entry.compressed_block_index,
            entry.compressed_block_index
        );

        if consumed != entry.compressed_size as u64 {
            return Err(CodecError::LengthMismatch {
                kind: entry.compression,
                expected: entry.compressed_size as usize,
                actual: consumed as usize,
            }
            .into());
        }
        if output.len() != entry.uncompressed_size as usize {
            return Err(CodecError::LengthMismatch {
                kind: entry.compression,
                expected: entry.uncompressed_size as usize,
                actual: output.len(),
            }
            .into());
        }

        Ok(output.into())
    }
}

/// The compression kind a table entry would be read with
pub fn effective_compression(entry: &TableEntry) -> CompressionKind {
    if entry.is_stored() {
        CompressionKind::None
    } else {
        entry.compression
    }
}

fn read_span<R: Read>(reader: &mut R, len: u32) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    reader.take(len as u64).read_to_end(&mut data)?;
    if data.len() != len as usize {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("payload ends after {} of {} bytes", data.len(), len),
        )
        .into());
    }
    Ok(data)
}

fn narrow(offset: u64) -> Result<u32> {
    u32::try_from(offset)
        .map_err(|_| Error::CustomError(format!("offset {offset:#x} does not fit the index")))
}
