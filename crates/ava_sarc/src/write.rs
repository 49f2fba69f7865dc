//! Modifying stream archives
//!

use std::io::{Cursor, Write};
use std::path::Path;

use binrw::BinWrite;
use byteorder::{LittleEndian, WriteBytesExt};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::{
    error::{Error, Result},
    read::{ArchiveEntry, FlatArchive},
    types::{SarcHeader, SARC_HEADER_SIZE},
};

/// Offset given to freshly added entries so the rebuild treats them as resident
const PLACEHOLDER_OFFSET: u32 = 1;

const fn align(value: u64, to: u64) -> u64 {
    (value + to - 1) / to * to
}

fn normalize(name: &str) -> String {
    name.replace('\\', "/")
}

impl FlatArchive {
    /// Insert or replace a file and rebuild the blob
    ///
    /// Every resident entry is moved to a new offset in declaration order, entries that live in a
    /// patch keep their sentinel offset. Only version 2 archives can be rebuilt.
    #[instrument(skip(self, data), fields(archive = %self.name, len = data.len()), err)]
    pub fn add_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        if self.version != 2 {
            return Err(Error::UnsupportedVersion(self.version));
        }

        let name = normalize(name);
        let size = u32::try_from(data.len())
            .map_err(|_| Error::CustomError(format!("{name} is larger than 4 GiB")))?;

        let mut entries = self.entries.clone();
        match entries.get_mut(&name) {
            Some(entry) => {
                entry.offset = PLACEHOLDER_OFFSET;
                entry.size = size;
                entry.patched = false;
            }
            None => {
                entries.insert(
                    name.clone(),
                    ArchiveEntry {
                        name: name.clone(),
                        offset: PLACEHOLDER_OFFSET,
                        size,
                        patched: false,
                    },
                );
            }
        }

        // resident sources must be readable before anything is overwritten
        for entry in entries.values() {
            if entry.is_resident() && entry.name != name {
                self.get_entry_bytes(entry)?;
            }
        }

        let header_size: u64 = entries
            .values()
            .map(|e| 4 + align(e.name.len() as u64, 4) + 8)
            .sum();
        let region_size = align(header_size, 16);
        let data_size: u64 = entries
            .values()
            .filter(|e| e.is_resident())
            .map(|e| align(e.size as u64, 4))
            .sum();

        let total = SARC_HEADER_SIZE + region_size + data_size;
        let mut out = Cursor::new(vec![0u8; total as usize]);
        SarcHeader {
            version: 2,
            region_size: region_size as u32,
        }
        .write(&mut out)?;

        let mut blob = std::mem::take(out.get_mut());
        let mut position = SARC_HEADER_SIZE as usize;
        let mut data_offset = SARC_HEADER_SIZE + region_size;

        for entry in entries.values_mut() {
            let resident = entry.is_resident();
            let offset = if resident {
                data_offset as u32
            } else {
                entry.offset
            };

            let padded = align(entry.name.len() as u64, 4) as usize;
            let mut record = Vec::with_capacity(4 + padded + 8);
            record.write_u32::<LittleEndian>(padded as u32)?;
            record.extend_from_slice(entry.name.as_bytes());
            record.resize(4 + padded, 0);
            record.write_u32::<LittleEndian>(offset)?;
            record.write_u32::<LittleEndian>(entry.size)?;
            blob[position..position + record.len()].copy_from_slice(&record);
            position += record.len();

            if resident {
                let start = offset as usize;
                let end = start + entry.size as usize;
                if entry.name == name {
                    blob[start..end].copy_from_slice(data);
                } else {
                    blob[start..end].copy_from_slice(&self.get_entry_bytes(entry)?);
                }

                entry.offset = offset;
                data_offset = align(data_offset + entry.size as u64, 4);
            }
        }

        debug!(
            "rebuilt archive: {} entries, {} byte region, {} bytes",
            entries.len(),
            region_size,
            blob.len()
        );

        self.entries = entries;
        self.buffer = blob.into();
        self.unsaved_changes = true;

        Ok(())
    }

    /// Add every file below `directory`, named by its path relative to `root`
    #[instrument(skip(self, directory, root), fields(directory = %directory.as_ref().display()), err)]
    pub fn add_directory(&mut self, directory: impl AsRef<Path>, root: impl AsRef<Path>) -> Result<usize> {
        let files = WalkDir::new(directory.as_ref())
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| !e.file_type().is_dir())
            .collect::<Vec<_>>();

        for file in &files {
            let name = file
                .path()
                .strip_prefix(root.as_ref())
                .map_err(|e| Error::CustomError(e.to_string()))?;
            let name = name
                .to_str()
                .ok_or_else(|| Error::CustomError(format!("{} is not UTF-8", name.display())))?;

            info!("adding {}", name);
            self.add_file(name, &std::fs::read(file.path())?)?;
        }

        Ok(files.len())
    }

    /// Serialise every entry as a TOC overlay
    pub fn write_toc(&self) -> Result<Vec<u8>> {
        if self.entries.is_empty() {
            return Err(Error::CustomError("nothing to write".into()));
        }

        let mut out = Vec::new();
        for entry in self.entries.values() {
            out.write_u32::<LittleEndian>(entry.name.len() as u32)?;
            out.write_all(entry.name.as_bytes())?;
            out.write_u32::<LittleEndian>(entry.offset)?;
            out.write_u32::<LittleEndian>(entry.size)?;
        }
        Ok(out)
    }
}
