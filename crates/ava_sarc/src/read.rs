//! Types for reading SARC stream archives
//!

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use ava_tab::hash::hash_path;
use binrw::BinRead;
use byteorder::{LittleEndian, ReadBytesExt};
use bytes::Bytes;
use indexmap::IndexMap;
use tracing::{debug, info, instrument, trace, warn};

use crate::{
    aaf,
    error::{Error, NotResidentReason, Result},
    types::{SarcHeader, SarcV3Entry, SARC_HEADER_SIZE},
};

/// Offset marking an entry whose bytes are not in this blob
pub const OFFSET_NOT_RESIDENT: u32 = 0;

/// Alternative "not resident" marker written by some patch tools
pub const OFFSET_NOT_RESIDENT_ALT: u32 = u32::MAX;

/// A file listed by a stream archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Generic path of the file
    pub name: String,
    pub offset: u32,
    pub size: u32,
    /// Offset and size came from a TOC overlay
    pub patched: bool,
}

impl ArchiveEntry {
    /// Whether the bytes of this entry are stored in the archive blob
    pub fn is_resident(&self) -> bool {
        self.offset != OFFSET_NOT_RESIDENT && self.offset != OFFSET_NOT_RESIDENT_ALT
    }
}

/// Counts reported after merging a TOC overlay
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct OverlayReport {
    /// Entries the overlay introduced
    pub added: usize,
    /// Existing entries whose offset or size changed
    pub patched: usize,
}

/// A stream archive held in memory
///
/// ```no_run
/// use ava_sarc::FlatArchive;
///
/// fn list(path: &str) -> ava_sarc::error::Result<()> {
///     let bytes = std::fs::read(path)?;
///     let toc = std::fs::read(format!("{path}.toc")).ok();
///     let archive = FlatArchive::open(path, bytes.into(), toc.as_deref())?;
///
///     for entry in archive.entries() {
///         println!("{} ({} bytes)", entry.name, entry.size);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FlatArchive {
    pub(crate) name: String,
    pub(crate) version: u32,
    pub(crate) buffer: Bytes,
    pub(crate) entries: IndexMap<String, ArchiveEntry>,
    pub(crate) using_toc: bool,
    pub(crate) unsaved_changes: bool,
}

impl FlatArchive {
    /// An empty version 2 archive
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 2,
            buffer: Bytes::new(),
            entries: IndexMap::new(),
            using_toc: false,
            unsaved_changes: false,
        }
    }

    /// Open an archive from its file contents, unwrapping an AAF container first when present
    #[instrument(skip(bytes, toc), fields(len = bytes.len(), toc = toc.is_some()), err)]
    pub fn open(name: &str, bytes: Bytes, toc: Option<&[u8]>) -> Result<Self> {
        let blob = if aaf::is_aaf(&bytes) {
            aaf::decompress(&bytes)?
        } else {
            bytes
        };

        let (mut archive, report) = Self::parse(blob, toc)?;
        archive.name = name.to_owned();
        if let Some(report) = report {
            if report.added > 0 || report.patched > 0 {
                info!(
                    "added {} and patched {} files from TOC",
                    report.added, report.patched
                );
            }
        }

        Ok(archive)
    }

    /// Parse an uncompressed SARC blob and merge `overlay` into its entries
    #[instrument(skip_all, fields(len = blob.len()), err)]
    pub fn parse(blob: Bytes, overlay: Option<&[u8]>) -> Result<(Self, Option<OverlayReport>)> {
        let mut reader = Cursor::new(&blob[..]);
        let header = SarcHeader::read(&mut reader)?;

        let region_end = SARC_HEADER_SIZE + header.region_size as u64;
        if region_end > blob.len() as u64 {
            return Err(Error::CustomError(format!(
                "entry region ends at {region_end} but the archive is {} bytes",
                blob.len()
            )));
        }

        let list = match header.version {
            3 => read_v3_entries(&mut reader, region_end)?,
            _ => read_v2_entries(&mut reader, region_end)?,
        };

        let mut entries = IndexMap::with_capacity(list.len());
        for entry in list {
            if entries.contains_key(&entry.name) {
                warn!("duplicate entry {}", entry.name);
                continue;
            }
            if entry.is_resident() && entry.offset as u64 + entry.size as u64 > blob.len() as u64 {
                warn!(
                    "{} runs past the end of the archive ({} + {} > {}), reading it will fail",
                    entry.name,
                    entry.offset,
                    entry.size,
                    blob.len()
                );
            }
            entries.insert(entry.name.clone(), entry);
        }
        debug!(
            "version {} archive with {} entries",
            header.version,
            entries.len()
        );

        let mut archive = Self {
            name: String::new(),
            version: header.version,
            buffer: blob,
            entries,
            using_toc: false,
            unsaved_changes: false,
        };

        let report = overlay.map(|toc| archive.apply_overlay(toc)).transpose()?;
        Ok((archive, report))
    }

    /// Merge a TOC overlay: names already listed get the overlay's offset and size, new names are
    /// appended
    #[instrument(skip_all, fields(len = toc.len()), err)]
    pub fn apply_overlay(&mut self, toc: &[u8]) -> Result<OverlayReport> {
        let mut reader = Cursor::new(toc);
        let mut report = OverlayReport::default();

        while reader.position() < toc.len() as u64 {
            let mut entry = read_inline_entry(&mut reader)?;
            entry.patched = true;

            match self.entries.get_mut(&entry.name) {
                Some(existing) => {
                    if existing.offset != entry.offset || existing.size != entry.size {
                        report.patched += 1;
                    }
                    existing.offset = entry.offset;
                    existing.size = entry.size;
                    existing.patched = true;
                }
                None => {
                    report.added += 1;
                    self.entries.insert(entry.name.clone(), entry);
                }
            }
        }

        self.using_toc = true;
        Ok(report)
    }

    /// Slice the bytes of `entry` out of the blob
    ///
    /// Fails with [`Error::NotResident`] when the bytes live somewhere else. Parsing keeps entries
    /// whose span runs past the blob, they are rejected here with
    /// [`NotResidentReason::OutOfBounds`].
    pub fn get_entry_bytes(&self, entry: &ArchiveEntry) -> Result<Bytes> {
        if !entry.is_resident() {
            return Err(Error::NotResident {
                name: entry.name.clone(),
                reason: NotResidentReason::Patched,
            });
        }

        let start = entry.offset as usize;
        let end = start + entry.size as usize;
        if end > self.buffer.len() {
            return Err(Error::NotResident {
                name: entry.name.clone(),
                reason: NotResidentReason::OutOfBounds,
            });
        }

        Ok(self.buffer.slice(start..end))
    }

    /// Read a file by name
    pub fn read_file(&self, name: &str) -> Result<Bytes> {
        let entry = self
            .entry(name)
            .ok_or_else(|| Error::FileNotFound(name.to_owned()))?;
        self.get_entry_bytes(entry)
    }

    /// Look up an entry by name
    #[inline(always)]
    pub fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        self.entries.get(name)
    }

    /// Whether the archive lists `name`
    pub fn has_file(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entries in declaration order
    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.values()
    }

    /// Returns an iterator over all the file names in this archive.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_ref())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The path the archive was opened from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// SARC version of the blob
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Whether a TOC overlay was merged in
    pub fn is_using_toc(&self) -> bool {
        self.using_toc
    }

    /// Whether files were added since the archive was opened or last saved
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved_changes
    }

    /// The uncompressed SARC blob
    pub fn as_bytes(&self) -> &Bytes {
        &self.buffer
    }

    /// The blob wrapped in an AAF container
    pub fn compress(&self, target_chunk_size: usize) -> Result<Vec<u8>> {
        aaf::compress(&self.buffer, target_chunk_size)?.to_bytes()
    }
}

/// `(name_len, name, offset, size)`, names padded with NULs
fn read_inline_entry<R: Read>(reader: &mut R) -> Result<ArchiveEntry> {
    let length = reader.read_u32::<LittleEndian>()?;

    let mut raw = Vec::new();
    reader.by_ref().take(length as u64).read_to_end(&mut raw)?;
    if raw.len() != length as usize {
        return Err(Error::CustomError(format!(
            "entry name is truncated ({} of {length} bytes)",
            raw.len()
        )));
    }
    let name_len = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    let name = String::from_utf8_lossy(&raw[..name_len]).into_owned();

    let offset = reader.read_u32::<LittleEndian>()?;
    let size = reader.read_u32::<LittleEndian>()?;

    Ok(ArchiveEntry {
        name,
        offset,
        size,
        patched: false,
    })
}

fn read_v2_entries(reader: &mut Cursor<&[u8]>, region_end: u64) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();
    // the region is padded to 16 bytes, a smaller remainder cannot hold another entry
    while region_end.saturating_sub(reader.position()) > 15 {
        let entry = read_inline_entry(reader)?;
        trace!("{:?}", entry);
        entries.push(entry);
    }
    Ok(entries)
}

fn read_v3_entries(reader: &mut Cursor<&[u8]>, region_end: u64) -> Result<Vec<ArchiveEntry>> {
    let strings_length = reader.read_u32::<LittleEndian>()?;
    let pool_start = reader.position();
    let pool_end = pool_start + strings_length as u64;
    if pool_end > region_end {
        return Err(Error::CustomError(format!(
            "name pool ends at {pool_end}, past the entry region at {region_end}"
        )));
    }

    let pool = &reader.get_ref()[pool_start as usize..pool_end as usize];
    let mut by_hash = HashMap::new();
    let mut by_offset = HashMap::new();
    let mut cursor = 0usize;
    for raw in pool.split(|b| *b == 0) {
        if !raw.is_empty() {
            let name = String::from_utf8_lossy(raw).into_owned();
            by_hash.insert(hash_path(&name), name.clone());
            by_offset.insert(cursor as u32, name);
        }
        cursor += raw.len() + 1;
    }
    reader.seek(std::io::SeekFrom::Start(pool_end))?;

    let mut entries = Vec::new();
    while region_end.saturating_sub(reader.position()) >= 20 {
        let raw = SarcV3Entry::read(reader)?;
        let name = by_hash
            .get(&raw.name_hash)
            .or_else(|| by_offset.get(&raw.name_offset))
            .cloned()
            .unwrap_or_else(|| {
                warn!("no name for hash {:#010x}", raw.name_hash);
                format!("{:08x}", raw.name_hash)
            });

        entries.push(ArchiveEntry {
            name,
            offset: raw.file_offset,
            size: raw.size,
            patched: false,
        });
    }
    Ok(entries)
}
